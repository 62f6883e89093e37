// src/runtime.rs

use libc::{swapcontext, ucontext_t};
use log::{debug, trace, warn};

use crate::mutex::MyMutex;
use crate::pool::ThreadPool;
use crate::sched::{Admission, Policy, SchedulerId};
use crate::tcb::{MyThreadId, Tcb, ThreadState};

/// Estado del runtime: pool de hilos, tabla de schedulers y el hilo que
/// tiene la CPU.
///
/// Modelo M:1 cooperativo sobre un único hilo del sistema: a lo sumo un TCB
/// está Running. El handler de SIGALRM comparte estas estructuras con el
/// código normal; toda mutación fuera del handler ocurre con la alarma
/// enmascarada (ver `timer::AlarmGuard`).
pub(crate) struct Runtime {
    pub(crate) pool: ThreadPool,
    pub(crate) schedulers: Vec<Policy>,
    pub(crate) current: Option<MyThreadId>,
}

impl Runtime {
    pub(crate) fn new() -> Self {
        Runtime {
            pool: ThreadPool::new(),
            schedulers: Vec::new(),
            current: None,
        }
    }

    /// Adopta al hilo que llama como main (tid 0) si el pool está vacío.
    pub(crate) fn ensure_main(&mut self) {
        if self.pool.len() == 0 {
            self.pool.register(Tcb::main_thread());
            self.current = Some(0);
        }
    }

    pub(crate) fn add_scheduler(&mut self, policy: Policy) -> SchedulerId {
        self.schedulers.push(policy);
        self.schedulers.len() - 1
    }

    /// Ata el hilo main al scheduler indicado sin encolarlo: está Running.
    pub(crate) fn bind_main(&mut self, sid: SchedulerId) {
        self.ensure_main();
        if sid < self.schedulers.len() {
            self.pool.get_mut(0).expect("main sin TCB").sched = Some(sid);
        }
    }

    fn pick_from(&mut self, sid: SchedulerId) -> Option<MyThreadId> {
        let Runtime {
            pool,
            schedulers,
            current,
        } = self;
        schedulers.get_mut(sid)?.pick_next(pool, *current)
    }

    /// Busca un candidato en el resto de las políticas, en orden de
    /// registro. Último recurso cuando el scheduler del hilo saliente quedó
    /// sin nadie y el saliente ya no puede continuar.
    fn pick_any(&mut self, excepto: SchedulerId) -> Option<MyThreadId> {
        for sid in 0..self.schedulers.len() {
            if sid == excepto {
                continue;
            }
            if let Some(tid) = self.pick_from(sid) {
                return Some(tid);
            }
        }
        None
    }

    /// Admite `tid` en el scheduler `sid` y atiende una eventual preempción
    /// por admisión.
    pub(crate) fn enqueue_on(&mut self, sid: SchedulerId, tid: MyThreadId) {
        if sid >= self.schedulers.len() || self.pool.get(tid).is_none() {
            return;
        }
        self.pool.get_mut(tid).expect("tid sin TCB").sched = Some(sid);

        let admission = {
            let Runtime {
                pool,
                schedulers,
                current,
            } = self;
            schedulers[sid].enqueue(pool, *current, tid)
        };
        debug_assert!(self.schedulers[sid].contains(tid));
        if admission == Admission::Preempt {
            self.admission_preempt(sid);
        }
    }

    /// Preempción por admisión (EDF): el que ejecutaba queda Ready y se
    /// cambia de contexto al elegido antes de que la admisión retorne.
    fn admission_preempt(&mut self, sid: SchedulerId) {
        let Some(prev) = self.current else { return };

        if let Some(t) = self.pool.get_mut(prev) {
            t.state = ThreadState::Ready;
        }
        // Si la política de prev no lo mantiene residente, readmitirlo aquí
        // evita perderlo; la admisión es idempotente para las que sí.
        if let Some(psid) = self.pool.get(prev).and_then(|t| t.sched) {
            let Runtime {
                pool,
                schedulers,
                current,
            } = self;
            let _ = schedulers[psid].enqueue(pool, *current, prev);
        }

        match self.pick_from(sid) {
            Some(next) if next != prev => {
                trace!("admisión preempta: hilo {prev} -> hilo {next}");
                self.swap(prev, next);
            }
            // Sin candidato distinto: prev conserva la CPU.
            _ => {
                if let Some(t) = self.pool.get_mut(prev) {
                    if t.state == ThreadState::Ready {
                        t.state = ThreadState::Running;
                    }
                }
            }
        }
    }

    /// Dispatcher: único punto de cambio de contexto. Consulta al scheduler
    /// del hilo actual; si no propone a nadie distinto, no hay cambio.
    pub(crate) fn schedule(&mut self) {
        let Some(prev) = self.current else { return };
        let Some(sid) = self.pool.get(prev).and_then(|t| t.sched) else {
            return;
        };

        let mut next = self.pick_from(sid);
        if next.is_none() {
            let estado = self.pool.state(prev);
            if estado == Some(ThreadState::Blocked) || estado == Some(ThreadState::Terminated) {
                // El scheduler de prev quedó vacío y prev no puede seguir:
                // antes de rendirse se consulta al resto de las políticas.
                next = self.pick_any(sid);
            }
        }

        let Some(next) = next else {
            // Nadie más que ejecutar: si prev cedió (Ready), conserva la CPU.
            if self.pool.state(prev) == Some(ThreadState::Ready) {
                self.pool.get_mut(prev).expect("prev sin TCB").state = ThreadState::Running;
            }
            return;
        };
        if next == prev {
            return;
        }

        // Preempción involuntaria: prev pierde la CPU sin haber cedido.
        // Queda Ready y, si su política no lo retiene, readmitido.
        if self.pool.state(prev) == Some(ThreadState::Running) {
            self.pool.get_mut(prev).expect("prev sin TCB").state = ThreadState::Ready;
            if let Some(psid) = self.pool.get(prev).and_then(|t| t.sched) {
                let Runtime {
                    pool,
                    schedulers,
                    current,
                } = self;
                let _ = schedulers[psid].enqueue(pool, *current, prev);
            }
        }

        self.swap(prev, next);
    }

    /// Cambio de contexto de prev a next. Retorna cuando prev vuelve a la
    /// CPU; el destino reanuda con su propia máscara de señales guardada.
    fn swap(&mut self, prev: MyThreadId, next: MyThreadId) {
        debug_assert_eq!(self.pool.state(next), Some(ThreadState::Running));
        self.current = Some(next);

        let prev_ctx: *mut ucontext_t = &mut self.pool.get_mut(prev).expect("prev sin TCB").context;
        let next_ctx: *mut ucontext_t = &mut self.pool.get_mut(next).expect("next sin TCB").context;

        let rc = unsafe { swapcontext(prev_ctx, next_ctx) };
        if rc != 0 {
            // Sin contexto válido no hay forma de continuar ni de recuperarse.
            panic!("swapcontext falló");
        }
    }

    pub(crate) fn create_thread(
        &mut self,
        entry: Box<dyn FnOnce()>,
        sid: SchedulerId,
        tickets: u32,
        priority: i32,
        deadline: i64,
    ) -> Option<MyThreadId> {
        self.ensure_main();
        if sid >= self.schedulers.len() {
            return None;
        }
        // Main sin scheduler queda atado al del primer hilo creado, para que
        // pueda volver a ser elegido después de ceder la CPU.
        if self.pool.get(0).map(|t| t.sched.is_none()) == Some(true) {
            self.pool.get_mut(0).expect("main sin TCB").sched = Some(sid);
        }

        let tid = self.pool.next_tid();
        let tcb = Tcb::new(tid, entry, tickets, priority, deadline, trampoline)?;
        debug!(
            "create: hilo {tid} (tickets={}, priority={}, deadline={}, pila de {} KiB) en scheduler {sid}",
            tcb.tickets,
            tcb.priority,
            tcb.deadline,
            tcb.stack.len() / 1024
        );
        self.pool.register(tcb);
        // La admisión puede preemptar (EDF): el hilo ya está Ready y
        // registrado antes de que create retorne.
        self.enqueue_on(sid, tid);
        Some(tid)
    }

    /// El hilo actual cede la CPU voluntariamente.
    pub(crate) fn yield_current(&mut self) {
        self.ensure_main();
        let Some(cur) = self.current else { return };
        if let Some(t) = self.pool.get_mut(cur) {
            if t.state == ThreadState::Running {
                t.state = ThreadState::Ready;
            }
        }
        if let Some(sid) = self.pool.get(cur).and_then(|t| t.sched) {
            self.enqueue_on(sid, cur);
        }
        self.schedule();
    }

    /// Bloquea al hilo actual: sale de la estructura de listos de su
    /// scheduler y cede la CPU. Quien lo despierte debe llamar a `unblock`.
    pub(crate) fn block_current(&mut self) {
        self.ensure_main();
        let Some(cur) = self.current else { return };
        if let Some(sid) = self.pool.get(cur).and_then(|t| t.sched) {
            if let Some(p) = self.schedulers.get_mut(sid) {
                p.remove(cur);
            }
        }
        self.pool.get_mut(cur).expect("current sin TCB").state = ThreadState::Blocked;
        self.schedule();

        if self.current == Some(cur) && self.pool.state(cur) == Some(ThreadState::Blocked) {
            // No quedó nadie a quien cederle la CPU: deadlock del programa
            // usuario. El hilo la conserva para poder reportarlo.
            warn!("block: no hay hilos listos; el hilo {cur} continúa");
            self.pool.get_mut(cur).expect("current sin TCB").state = ThreadState::Running;
        }
    }

    /// Despierta a `tid`: Ready y admitido en el scheduler del propio hilo.
    pub(crate) fn unblock(&mut self, tid: MyThreadId) {
        let Some(sid) = self.pool.get(tid).and_then(|t| t.sched) else {
            return;
        };
        self.enqueue_on(sid, tid);
    }

    /// Termina al hilo actual. Nunca retorna: o se cambia a otro contexto o,
    /// si no queda ningún hilo listo en el proceso, este finaliza.
    pub(crate) fn finish_current(&mut self) -> ! {
        self.ensure_main();
        if let Some(cur) = self.current {
            if let Some(t) = self.pool.get_mut(cur) {
                t.state = ThreadState::Terminated;
                t.entry = None;
            }
            debug!("end: hilo {cur} terminado");
            let joiner = self.pool.get_mut(cur).and_then(|t| t.joiner.take());
            if let Some(j) = joiner {
                self.unblock(j);
            }
            self.schedule();
        }
        // Un Terminated jamás se reanuda: llegar aquí significa que ninguna
        // política tiene hilos listos.
        std::process::exit(0);
    }

    /// Espera a que `tid` termine. Sobre un tid inexistente, ya terminado,
    /// detached o el propio, retorna de inmediato sin bloquear.
    pub(crate) fn join(&mut self, tid: MyThreadId) {
        self.ensure_main();
        let Some(cur) = self.current else { return };
        match self.pool.get(tid) {
            None => return,
            Some(t) => {
                if tid == cur || t.state == ThreadState::Terminated || t.detached {
                    return;
                }
            }
        }
        debug!("join: hilo {cur} espera a {tid}");
        self.pool.get_mut(tid).expect("tid sin TCB").joiner = Some(cur);
        self.block_current();
    }

    pub(crate) fn detach(&mut self, tid: MyThreadId) -> i32 {
        match self.pool.get_mut(tid) {
            Some(t) => {
                t.detached = true;
                0
            }
            None => -1,
        }
    }

    /// Migra `tid` a otro scheduler en caliente. Funciona sobre cualquier
    /// estado salvo Terminated; un Running sigue ejecutando y solo se ve
    /// afectado en su siguiente dispatch.
    pub(crate) fn chsched(&mut self, tid: MyThreadId, new_sid: SchedulerId) -> i32 {
        if new_sid >= self.schedulers.len() {
            return -1;
        }
        let (old, estado) = match self.pool.get(tid) {
            None => return -1,
            Some(t) if t.state == ThreadState::Terminated => return -1,
            Some(t) => (t.sched, t.state),
        };

        if let Some(osid) = old {
            if let Some(p) = self.schedulers.get_mut(osid) {
                p.remove(tid);
            }
        }
        self.pool.get_mut(tid).expect("tid sin TCB").sched = Some(new_sid);
        match estado {
            // Un bloqueado no se despierta por migrar: entrará a la nueva
            // estructura cuando lo desbloqueen.
            ThreadState::Blocked => {}
            _ => self.enqueue_on(new_sid, tid),
        }
        debug!("chsched: hilo {tid} -> scheduler {new_sid}");
        0
    }

    pub(crate) fn alive_count(&self) -> usize {
        self.pool.alive_count()
    }

    pub(crate) fn thread_state(&self, tid: MyThreadId) -> Option<ThreadState> {
        self.pool.state(tid)
    }

    // ----- Operaciones de mutex (necesitan saber quién es el actual) ----- //

    pub(crate) fn mutex_lock(&mut self, m: &mut MyMutex) -> i32 {
        self.ensure_main();
        let Some(cur) = self.current else { return -1 };

        if !m.locked {
            m.locked = true;
            m.owner = Some(cur);
            return 0;
        }
        if m.owner == Some(cur) {
            // No recursivo.
            return -1;
        }

        trace!("lock: hilo {cur} espera el mutex");
        m.waiters.push_back(cur);
        self.block_current();

        // Al reanudar, el dueño ya fue traspasado directamente en unlock.
        debug_assert!(m.locked);
        debug_assert_eq!(m.owner, Some(cur));
        0
    }

    pub(crate) fn mutex_trylock(&mut self, m: &mut MyMutex) -> i32 {
        self.ensure_main();
        let Some(cur) = self.current else { return -1 };

        if !m.locked {
            m.locked = true;
            m.owner = Some(cur);
            0
        } else {
            -1
        }
    }

    pub(crate) fn mutex_unlock(&mut self, m: &mut MyMutex) -> i32 {
        self.ensure_main();
        let Some(cur) = self.current else { return -1 };
        if !m.locked || m.owner != Some(cur) {
            return -1;
        }

        if let Some(siguiente) = m.waiters.pop_front() {
            // Traspaso directo: el mutex sigue tomado y cambia de dueño, sin
            // ventana para que un tercero lo adquiera entre medio.
            m.owner = Some(siguiente);
            self.unblock(siguiente);
        } else {
            m.locked = false;
            m.owner = None;
        }
        0
    }
}

/// Runtime global del proceso, creado perezosamente y de vida completa.
static mut RUNTIME: *mut Runtime = std::ptr::null_mut();

/// Acceso al runtime global. El modelo es mono-hilo a nivel de sistema: el
/// único acceso concurrente posible es el handler de SIGALRM, y las rutas
/// normales lo enmascaran alrededor de cada operación.
pub(crate) fn runtime() -> &'static mut Runtime {
    unsafe {
        if RUNTIME.is_null() {
            RUNTIME = Box::leak(Box::new(Runtime::new()));
        }
        &mut *RUNTIME
    }
}

/// Trampolín inicial de todo hilo nuevo: ejecuta la rutina y garantiza que
/// el hilo termine por `my_thread_end` aunque la rutina retorne normalmente.
pub(crate) extern "C" fn trampoline() {
    let entry = {
        let rt = runtime();
        let tid = rt.current.expect("trampolín sin hilo actual");
        rt.pool.get_mut(tid).and_then(|t| t.entry.take())
    };
    if let Some(f) = entry {
        f();
    }
    crate::my_thread_end();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::{Edf, Lottery, RoundRobin};

    fn runtime_con_rr() -> (Runtime, SchedulerId) {
        let mut rt = Runtime::new();
        let sid = rt.add_scheduler(Policy::RoundRobin(RoundRobin::new(100)));
        rt.ensure_main();
        rt.bind_main(sid);
        (rt, sid)
    }

    fn crear(rt: &mut Runtime, sid: SchedulerId, tickets: u32, deadline: i64) -> MyThreadId {
        rt.create_thread(Box::new(|| {}), sid, tickets, 0, deadline)
            .expect("create falló")
    }

    #[test_log::test]
    fn test_create_registra_y_encola() {
        let (mut rt, sid) = runtime_con_rr();
        let a = crear(&mut rt, sid, 0, 0);
        assert_eq!(a, 1); // el main es el 0
        assert_eq!(rt.thread_state(a), Some(ThreadState::Ready));
        assert!(rt.schedulers[sid].contains(a));
        assert_eq!(rt.alive_count(), 2);
    }

    #[test]
    fn test_create_con_scheduler_invalido() {
        let mut rt = Runtime::new();
        assert!(rt.create_thread(Box::new(|| {}), 9, 0, 0, 0).is_none());
    }

    #[test]
    fn test_detach_idempotente() {
        let (mut rt, sid) = runtime_con_rr();
        let a = crear(&mut rt, sid, 0, 0);
        assert_eq!(rt.detach(a), 0);
        assert_eq!(rt.detach(a), 0);
        assert_eq!(rt.detach(99), -1);
        assert!(rt.pool.get(a).unwrap().detached);
    }

    #[test]
    fn test_join_casos_inmediatos() {
        let (mut rt, sid) = runtime_con_rr();
        let a = crear(&mut rt, sid, 0, 0);

        // Sobre sí mismo, inexistente, terminado o detached: no bloquea.
        rt.join(0);
        rt.join(99);
        rt.pool.get_mut(a).unwrap().state = ThreadState::Terminated;
        rt.join(a);
        assert_eq!(rt.thread_state(0), Some(ThreadState::Running));

        let b = crear(&mut rt, sid, 0, 0);
        rt.detach(b);
        rt.join(b);
        assert_eq!(rt.thread_state(0), Some(ThreadState::Running));
        assert!(rt.pool.get(b).unwrap().joiner.is_none());
    }

    #[test]
    fn test_chsched_idempotente_y_migracion() {
        let (mut rt, rr) = runtime_con_rr();
        let edf = rt.add_scheduler(Policy::Edf(Edf::new()));

        // Seis hilos admitidos en EDF y migrados en caliente a RR: quedan en
        // RR exactamente una vez y en el orden de migración; EDF vacío.
        let hilos: Vec<_> = (0..6).map(|i| crear(&mut rt, edf, 0, 100 + i)).collect();
        for &t in &hilos {
            assert_eq!(rt.chsched(t, rr), 0);
            assert_eq!(rt.chsched(t, rr), 0);
        }
        for &t in &hilos {
            assert!(rt.schedulers[rr].contains(t));
            assert!(!rt.schedulers[edf].contains(t));
            assert_eq!(rt.pool.get(t).unwrap().sched, Some(rr));
        }
        for &esperado in &hilos {
            assert_eq!(rt.pick_from(rr), Some(esperado));
            rt.pool.get_mut(esperado).unwrap().state = ThreadState::Ready;
        }
    }

    #[test]
    fn test_chsched_sobre_terminado() {
        let (mut rt, rr) = runtime_con_rr();
        let a = crear(&mut rt, rr, 0, 0);
        rt.pool.get_mut(a).unwrap().state = ThreadState::Terminated;
        assert_eq!(rt.chsched(a, rr), -1);
    }

    #[test]
    fn test_chsched_bloqueado_no_despierta() {
        let (mut rt, rr) = runtime_con_rr();
        let edf = rt.add_scheduler(Policy::Edf(Edf::new()));
        let a = crear(&mut rt, rr, 0, 0);

        rt.schedulers[rr].remove(a);
        rt.pool.get_mut(a).unwrap().state = ThreadState::Blocked;

        assert_eq!(rt.chsched(a, edf), 0);
        assert_eq!(rt.thread_state(a), Some(ThreadState::Blocked));
        assert!(!rt.schedulers[edf].contains(a));
        // Al despertar entra a su nuevo scheduler.
        rt.unblock(a);
        assert_eq!(rt.thread_state(a), Some(ThreadState::Ready));
        assert!(rt.schedulers[edf].contains(a));
    }

    #[test]
    fn test_edf_admision_sin_preempcion_para_menos_urgente() {
        let mut rt = Runtime::new();
        let edf = rt.add_scheduler(Policy::Edf(Edf::new()));
        rt.ensure_main();
        rt.bind_main(edf);

        // El main (deadline 0) ejecuta; admitir deadlines mayores no debe
        // disparar ningún cambio de contexto.
        let a = crear(&mut rt, edf, 0, 200);
        let b = crear(&mut rt, edf, 0, 300);
        assert_eq!(rt.current, Some(0));
        assert_eq!(rt.thread_state(0), Some(ThreadState::Running));
        assert_eq!(rt.thread_state(a), Some(ThreadState::Ready));
        assert_eq!(rt.thread_state(b), Some(ThreadState::Ready));
    }

    #[test]
    fn test_alive_count() {
        let (mut rt, sid) = runtime_con_rr();
        let a = crear(&mut rt, sid, 0, 0);
        crear(&mut rt, sid, 0, 0);
        assert_eq!(rt.alive_count(), 3);
        rt.pool.get_mut(a).unwrap().state = ThreadState::Terminated;
        assert_eq!(rt.alive_count(), 2);
    }

    #[test]
    fn test_trylock_y_recursivo() {
        let (mut rt, _sid) = runtime_con_rr();
        let mut m = MyMutex::new();

        assert_eq!(rt.mutex_trylock(&mut m), 0);
        assert_eq!(m.owner, Some(0));
        // Recursivo: error sin mutar estado.
        assert_eq!(rt.mutex_lock(&mut m), -1);
        assert_eq!(rt.mutex_trylock(&mut m), -1);
        assert!(m.locked);

        assert_eq!(rt.mutex_unlock(&mut m), 0);
        assert!(!m.locked);
        assert_eq!(m.owner, None);
    }

    #[test]
    fn test_unlock_sin_ser_duenio() {
        let (mut rt, _sid) = runtime_con_rr();
        let mut m = MyMutex::new();
        assert_eq!(rt.mutex_unlock(&mut m), -1);

        m.locked = true;
        m.owner = Some(42);
        assert_eq!(rt.mutex_unlock(&mut m), -1);
        assert_eq!(m.owner, Some(42));
    }

    #[test_log::test]
    fn test_unlock_traspasa_al_primero_en_espera() {
        let (mut rt, sid) = runtime_con_rr();
        let a = crear(&mut rt, sid, 0, 0);
        let b = crear(&mut rt, sid, 0, 0);

        let mut m = MyMutex::new();
        assert_eq!(rt.mutex_lock(&mut m), 0); // la toma el main

        // a y b quedan en espera, en orden FIFO.
        for &t in &[a, b] {
            rt.schedulers[sid].remove(t);
            rt.pool.get_mut(t).unwrap().state = ThreadState::Blocked;
            m.waiters.push_back(t);
        }

        assert_eq!(rt.mutex_unlock(&mut m), 0);
        // El mutex sigue tomado, con a como nuevo dueño ya listo.
        assert!(m.locked);
        assert_eq!(m.owner, Some(a));
        assert_eq!(rt.thread_state(a), Some(ThreadState::Ready));
        assert!(rt.schedulers[sid].contains(a));
        assert_eq!(m.waiters.len(), 1);
        assert_eq!(rt.thread_state(b), Some(ThreadState::Blocked));
    }

    #[test]
    fn test_lottery_en_runtime() {
        let mut rt = Runtime::new();
        let sid = rt.add_scheduler(Policy::Lottery(Lottery::with_seed(100, 11)));
        rt.ensure_main();
        rt.bind_main(sid);

        let a = crear(&mut rt, sid, 3, 0);
        for _ in 0..20 {
            assert_eq!(rt.pick_from(sid), Some(a));
            rt.enqueue_on(sid, a);
        }
    }
}
