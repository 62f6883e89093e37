// tests/rr_turnos.rs
//
// Equidad Round Robin: tres hilos que ceden la CPU nueve veces cada uno
// deben despacharse en rotación estricta A, B, C, A, B, C, ...

use std::sync::atomic::{AtomicUsize, Ordering};

use hilos::*;

static TURNO: AtomicUsize = AtomicUsize::new(0);
static ORDEN: [AtomicUsize; 32] = [const { AtomicUsize::new(usize::MAX) }; 32];

fn main() {
    let rr = rr_init(100);
    init_runtime(rr);
    assert_eq!(scheduler_activo(), 1);

    let mut tids = Vec::new();
    for id in 0..3usize {
        let tid = my_thread_create(
            move || {
                for _ in 0..9 {
                    let slot = TURNO.fetch_add(1, Ordering::Relaxed);
                    ORDEN[slot].store(id, Ordering::Relaxed);
                    my_thread_yield();
                }
            },
            rr,
            0,
            0,
            0,
        );
        assert!(tid >= 0);
        tids.push(tid as MyThreadId);
    }
    assert_eq!(threadpool_alive_count(), 4);

    for &tid in &tids {
        my_thread_join(tid);
        assert_eq!(my_thread_state(tid), Some(ThreadState::Terminated));
    }

    let primeros: Vec<usize> = (0..9).map(|i| ORDEN[i].load(Ordering::Relaxed)).collect();
    assert_eq!(primeros, vec![0, 1, 2, 0, 1, 2, 0, 1, 2]);
    assert_eq!(TURNO.load(Ordering::Relaxed), 27);
    assert_eq!(threadpool_alive_count(), 1);
    println!("rr_turnos: OK");
}
