// src/main.rs
//
// Banco de pruebas de la librería hilos: ejercita las tres políticas, la
// migración en caliente, join/detach y el mutex con su mapa de ocupación.
// Hace las veces del colaborador de animación: los "vehículos" son hilos
// que reclaman y liberan posiciones de un canvas compartido bajo el mutex.

use hilos::*;

/// Estado compartido entre todos los hilos.
struct Banco {
    canvas: MyMutex,
    rr_counter: i64,
    lottery_counter: [i64; 3],
    edf_counter: i64,
}

fn main() {
    println!("=== Banco de pruebas hilos ===");

    let rr = rr_init(50);
    let lot = lottery_init(50);
    let edf = edf_init();
    init_runtime(rr);
    println!("[MAIN] scheduler_activo = {}", scheduler_activo());

    let banco: *mut Banco = Box::leak(Box::new(Banco {
        canvas: MyMutex::new(),
        rr_counter: 0,
        lottery_counter: [0; 3],
        edf_counter: 0,
    }));

    // ----- 1) Hilos Round Robin: lock/trylock y canvas ----- //
    let mut rr_ids = Vec::new();
    for id in 0..4usize {
        let tid = my_thread_create(
            move || unsafe {
                let mut ok = 0;
                let mut fallos = 0;
                let mut celda: Option<i32> = None;
                for i in 0..200i32 {
                    let m = &mut (*banco).canvas;
                    // Cada 3 iteraciones lock bloqueante; el resto trylock.
                    let tomado = if i % 3 == 0 {
                        my_mutex_lock(m) == 0
                    } else {
                        my_mutex_trylock(m) == 0
                    };
                    if tomado {
                        (*banco).rr_counter += 1;
                        // El vehículo avanza: reclama la celda nueva de su
                        // columna y libera la anterior.
                        m.occupy(id as i32, i % 8, id);
                        if let Some(fila) = celda {
                            if fila != i % 8 {
                                m.release(id as i32, fila, id);
                            }
                        }
                        celda = Some(i % 8);
                        ok += 1;
                        my_mutex_unlock(m);
                    } else {
                        fallos += 1;
                    }
                    my_thread_yield();
                }
                // Deja el canvas limpio al retirarse.
                if let Some(fila) = celda {
                    let m = &mut (*banco).canvas;
                    my_mutex_lock(m);
                    m.release(id as i32, fila, id);
                    my_mutex_unlock(m);
                }
                println!("[RR] trabajador {id} terminó: ok={ok}, fallos_trylock={fallos}");
            },
            rr,
            0,
            0,
            0,
        );
        assert!(tid >= 0);
        rr_ids.push(tid as MyThreadId);
    }

    // Promoción en caliente: el primer RR pasa a EDF con deadline urgente.
    let promovido = rr_ids[0];
    let rc = my_thread_chsched(promovido, edf);
    println!("[MAIN] chsched RR->EDF del tid {promovido}, rc={rc}");

    // ----- 2) Hilos Lottery: pesos 1/3/7, el más pesado detached ----- //
    let mut lot_ids = Vec::new();
    let mut detached = 0;
    for idx in 0..3usize {
        let tickets = match idx {
            0 => 1,
            1 => 3,
            _ => 7,
        };
        let vueltas = if idx == 2 { 40 } else { 120 };
        let tid = my_thread_create(
            move || unsafe {
                for _ in 0..vueltas {
                    let m = &mut (*banco).canvas;
                    my_mutex_lock(m);
                    (*banco).lottery_counter[idx] += 1;
                    my_mutex_unlock(m);
                    my_thread_yield();
                }
                println!("[LOT] trabajador {idx} terminó");
            },
            lot,
            tickets,
            0,
            0,
        );
        assert!(tid >= 0);
        if idx == 2 {
            detached = tid as MyThreadId;
            let rc = my_thread_detach(detached);
            println!("[MAIN] detach del tid {detached} (tickets={tickets}), rc={rc}");
        } else {
            lot_ids.push(tid as MyThreadId);
        }
    }

    // ----- 3) Hilos EDF: uno termina temprano, otro engendra uno urgente - //
    let mut edf_ids = Vec::new();
    for (idx, deadline) in [(0usize, 5i64), (1, 10)] {
        let tid = my_thread_create(
            move || unsafe {
                for i in 0..60 {
                    let m = &mut (*banco).canvas;
                    my_mutex_lock(m);
                    (*banco).edf_counter += 1;
                    my_mutex_unlock(m);
                    my_thread_yield();

                    if idx == 0 && i == 30 {
                        println!("[EDF] tarea {idx} finaliza temprano con my_thread_end");
                        my_thread_end();
                    }
                    if idx == 1 && i == 10 {
                        // Nace un hilo más urgente: la admisión preempta y
                        // lo corre completo antes de seguir.
                        let urgente = my_thread_create(
                            move || unsafe {
                                let m = &mut (*banco).canvas;
                                my_mutex_lock(m);
                                (*banco).edf_counter += 100;
                                my_mutex_unlock(m);
                                println!("[EDF] tarea urgente ejecutada");
                            },
                            edf,
                            0,
                            0,
                            1,
                        );
                        assert!(urgente >= 0);
                    }
                }
                println!("[EDF] tarea {idx} terminó normalmente");
            },
            edf,
            0,
            0,
            deadline,
        );
        assert!(tid >= 0);
        edf_ids.push(tid as MyThreadId);
    }

    println!("[MAIN] hilos vivos antes de esperar: {}", threadpool_alive_count());

    // ----- 4) Esperas ----- //
    for tid in rr_ids.iter().chain(&lot_ids).chain(&edf_ids) {
        my_thread_join(*tid);
        println!("[MAIN] join del tid {tid} completado");
    }

    // Si el detached sigue vivo, se lo trae al RR del main y se le cede la
    // CPU hasta que termine solo (a un detached nadie lo espera con join).
    while my_thread_state(detached) != Some(ThreadState::Terminated) {
        my_thread_chsched(detached, rr);
        my_thread_yield();
    }

    // ----- 5) Resumen ----- //
    unsafe {
        let banco = &mut *banco;
        println!("=== Resumen ===");
        println!("rr_counter       = {}", banco.rr_counter);
        println!("lottery_counter  = {:?}", banco.lottery_counter);
        println!("edf_counter      = {}", banco.edf_counter);
        println!("posiciones ocupadas al final = {}", banco.canvas.occupied_len());
        let rc = my_mutex_destroy(&mut banco.canvas);
        println!("my_mutex_destroy rc = {rc}");
        println!("hilos vivos al final = {}", threadpool_alive_count());
    }
    println!("===============");
}
