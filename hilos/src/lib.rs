// src/lib.rs

//! hilos: hilos de usuario M:1 con schedulers intercambiables.
//!
//! Biblioteca cooperativa sobre contextos guardados (`ucontext`): a lo sumo
//! un hilo ejecuta a la vez y la CPU cambia de manos por cesión voluntaria
//! (`my_thread_yield`, `my_thread_end`, `my_thread_join`, lock contendido) o
//! por el timer de preempción que arman RR y Lottery. Cada hilo pertenece a
//! un scheduler (Round Robin, Lottery o EDF) y puede migrar en caliente con
//! `my_thread_chsched`.
//!
//! ```no_run
//! use hilos::*;
//!
//! let rr = rr_init(100);
//! init_runtime(rr);
//! let tid = my_thread_create(|| println!("hola desde el hilo"), rr, 0, 0, 0);
//! my_thread_join(tid as MyThreadId);
//! ```

use std::os::raw::c_int;
use std::sync::atomic::{AtomicI32, Ordering};

use log::debug;

mod mutex;
mod pool;
mod runtime;
mod sched;
mod tcb;
mod timer;

pub use mutex::MyMutex;
pub use sched::SchedulerId;
pub use tcb::{MyThreadId, ThreadState, STACK_SIZE};

use runtime::runtime;
use sched::{Edf, Lottery, Policy, RoundRobin};
use timer::AlarmGuard;

/// Quantum por defecto del timer de preempción, en milisegundos.
pub const QUANTUM_MS: u32 = 100;

/// Política activa del proceso: 0 = EDF, 1 = RR, 2 = Lottery. La escribe el
/// último `*_init` ejecutado; los colaboradores la leen para decidir entre
/// sleeps amigables con ncurses y esperas activas. El runtime no depende de
/// ella.
static SCHEDULER_ACTIVO: AtomicI32 = AtomicI32::new(0);

pub fn scheduler_activo() -> i32 {
    SCHEDULER_ACTIVO.load(Ordering::Relaxed)
}

// ============ Constructores de schedulers ============ //

/// Registra la política en el runtime, publica su etiqueta como política
/// activa y, si define quantum, arma el timer de preempción.
fn registrar_scheduler(policy: Policy) -> SchedulerId {
    let _guardia = AlarmGuard::new();
    let rt = runtime();
    let sid = rt.add_scheduler(policy);
    SCHEDULER_ACTIVO.store(rt.schedulers[sid].tag(), Ordering::Relaxed);
    if let Some(quantum_ms) = rt.schedulers[sid].quantum_ms() {
        timer::start_preemption(quantum_ms);
    }
    debug!("scheduler {sid} registrado (tag={})", rt.schedulers[sid].tag());
    sid
}

/// Registra un scheduler Round Robin y arma el timer periódico de
/// `quantum_ms`. Un fallo al armar el timer es fatal.
pub fn rr_init(quantum_ms: u32) -> SchedulerId {
    registrar_scheduler(Policy::RoundRobin(RoundRobin::new(quantum_ms)))
}

/// Registra un scheduler Lottery (sorteo sembrado desde la entropía del
/// proceso) y arma el timer periódico de `quantum_ms`.
pub fn lottery_init(quantum_ms: u32) -> SchedulerId {
    registrar_scheduler(Policy::Lottery(Lottery::new(quantum_ms)))
}

/// Como `lottery_init`, pero con semilla fija: mismos sorteos en cada
/// corrida. Útil para reproducir una ejecución.
pub fn lottery_init_seeded(quantum_ms: u32, seed: u64) -> SchedulerId {
    registrar_scheduler(Policy::Lottery(Lottery::with_seed(quantum_ms, seed)))
}

/// Registra un scheduler EDF. No arma timer: la preempción de EDF ocurre
/// solo en la admisión o en cesiones voluntarias.
pub fn edf_init() -> SchedulerId {
    registrar_scheduler(Policy::Edf(Edf::new()))
}

/// Adopta al hilo que llama como main (tid 0) y lo ata al scheduler dado.
/// Llamarlo antes que cualquier otra operación deja el arranque explícito;
/// si se omite, el main queda atado al scheduler del primer hilo creado.
pub fn init_runtime(sched: SchedulerId) {
    let _guardia = AlarmGuard::new();
    runtime().bind_main(sched);
}

// ============ API de ciclo de vida ============ //

/// Crea un hilo que ejecuta `f` bajo el scheduler `sched` con los parámetros
/// de planificación dados (`tickets` para Lottery, `priority` reservado,
/// `deadline` para EDF). El hilo queda Ready y registrado antes de retornar;
/// en EDF la admisión puede preemptar al que ejecuta.
///
/// Retorna el tid, o -1 si no se pudo reservar la pila.
pub fn my_thread_create<F>(
    f: F,
    sched: SchedulerId,
    tickets: u32,
    priority: i32,
    deadline: i64,
) -> c_int
where
    F: FnOnce() + 'static,
{
    let _guardia = AlarmGuard::new();
    match runtime().create_thread(Box::new(f), sched, tickets, priority, deadline) {
        Some(tid) => tid as c_int,
        None => -1,
    }
}

/// El hilo actual cede la CPU voluntariamente.
pub fn my_thread_yield() {
    let _guardia = AlarmGuard::new();
    runtime().yield_current();
}

/// Termina el hilo actual. Si alguien lo esperaba con join, queda Ready en
/// su scheduler. Nunca retorna.
pub fn my_thread_end() -> ! {
    let _guardia = AlarmGuard::new();
    runtime().finish_current()
}

/// Espera a que el hilo `tid` termine. Sobre un tid inexistente, ya
/// terminado, detached o el propio hilo, retorna de inmediato.
pub fn my_thread_join(tid: MyThreadId) {
    let _guardia = AlarmGuard::new();
    runtime().join(tid);
}

/// Marca el hilo como detached: ningún join posterior lo esperará.
/// Retorna 0, o -1 si el tid no existe. Es idempotente.
pub fn my_thread_detach(tid: MyThreadId) -> c_int {
    let _guardia = AlarmGuard::new();
    runtime().detach(tid)
}

/// Migra el hilo `tid` al scheduler `sched` en caliente. Funciona sobre
/// cualquier estado salvo Terminated; repetirlo es inocuo.
pub fn my_thread_chsched(tid: MyThreadId, sched: SchedulerId) -> c_int {
    let _guardia = AlarmGuard::new();
    runtime().chsched(tid, sched)
}

/// Estado actual del hilo `tid`, si existe.
pub fn my_thread_state(tid: MyThreadId) -> Option<ThreadState> {
    let _guardia = AlarmGuard::new();
    runtime().thread_state(tid)
}

/// Cantidad de hilos del pool con estado distinto de Terminated.
pub fn threadpool_alive_count() -> c_int {
    let _guardia = AlarmGuard::new();
    runtime().alive_count() as c_int
}

// ============ API de mutex ============ //

/// Reinicializa un mutex: libre, sin dueño, sin esperas y con el mapa de
/// ocupación vacío.
pub fn my_mutex_init(m: &mut MyMutex) -> c_int {
    *m = MyMutex::new();
    0
}

/// Destruye el mutex. Falla con -1 si está tomado o hay hilos esperando:
/// las esperas nunca se descartan en silencio. Si tiene éxito, también
/// limpia el mapa de ocupación.
pub fn my_mutex_destroy(m: &mut MyMutex) -> c_int {
    if m.is_locked() || m.waiters_len() > 0 {
        return -1;
    }
    *m = MyMutex::new();
    0
}

/// Toma el mutex; si está ocupado, el hilo queda Blocked en la cola FIFO.
/// Al reanudarse ya es el dueño (traspaso directo en unlock). Retorna -1 si
/// el dueño actual intenta tomarlo de nuevo (no recursivo).
pub fn my_mutex_lock(m: &mut MyMutex) -> c_int {
    let _guardia = AlarmGuard::new();
    runtime().mutex_lock(m)
}

/// Variante no bloqueante de lock: -1 si el mutex está ocupado.
pub fn my_mutex_trylock(m: &mut MyMutex) -> c_int {
    let _guardia = AlarmGuard::new();
    runtime().mutex_trylock(m)
}

/// Libera el mutex. Si hay esperas, el primero de la cola recibe el mutex
/// directamente y despierta en su scheduler. Retorna -1 si el mutex no está
/// tomado o quien llama no es el dueño.
pub fn my_mutex_unlock(m: &mut MyMutex) -> c_int {
    let _guardia = AlarmGuard::new();
    runtime().mutex_unlock(m)
}
