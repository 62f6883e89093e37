// src/sched/lottery.rs

use crate::pool::ThreadPool;
use crate::sched::Admission;
use crate::tcb::{MyThreadId, ThreadState};

/// Scheduler por lotería: selección aleatoria ponderada por tickets.
///
/// Mantiene la lista de hilos admitidos; en cada sorteo participan solo los
/// que están Ready. El ganador se desconecta de la lista mientras ejecuta y
/// vuelve a entrar al siguiente sorteo cuando pierde la CPU.
pub(crate) struct Lottery {
    pub(crate) quantum_ms: u32,
    list: Vec<MyThreadId>,
    rng: fastrand::Rng,
}

impl Lottery {
    /// Sorteos sembrados desde la fuente de entropía del proceso, como el
    /// `srand(time(NULL))` del quantum clásico.
    pub(crate) fn new(quantum_ms: u32) -> Self {
        Lottery {
            quantum_ms,
            list: Vec::new(),
            rng: fastrand::Rng::new(),
        }
    }

    /// Variante con semilla fija para corridas reproducibles.
    pub(crate) fn with_seed(quantum_ms: u32, seed: u64) -> Self {
        Lottery {
            quantum_ms,
            list: Vec::new(),
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    pub(crate) fn enqueue(&mut self, pool: &mut ThreadPool, tid: MyThreadId) -> Admission {
        if let Some(t) = pool.get_mut(tid) {
            t.state = ThreadState::Ready;
        }
        if !self.list.contains(&tid) {
            self.list.push(tid);
        }
        Admission::Queued
    }

    pub(crate) fn pick_next(
        &mut self,
        pool: &mut ThreadPool,
        current: Option<MyThreadId>,
    ) -> Option<MyThreadId> {
        // El hilo que venía ejecutando vuelve a participar en el sorteo.
        if let Some(prev) = current {
            if pool.state(prev) == Some(ThreadState::Running) {
                pool.get_mut(prev).expect("current sin TCB").state = ThreadState::Ready;
                if !self.list.contains(&prev) {
                    self.list.push(prev);
                }
            }
        }

        let total: u64 = self
            .list
            .iter()
            .filter(|&&tid| pool.state(tid) == Some(ThreadState::Ready))
            .map(|&tid| u64::from(pool.get(tid).expect("tid en lista sin TCB").tickets))
            .sum();
        if total == 0 {
            return None;
        }

        // Ganador en [1, total]: la suma acumulada de tickets de los Ready
        // alcanza al ganador en el primer hilo cuyo rango lo contiene. Un
        // hilo con 0 tickets nunca mueve la suma, así que nunca gana.
        let winner = self.rng.u64(1..=total);
        let mut acc = 0u64;
        let mut elegido = None;
        for (i, &tid) in self.list.iter().enumerate() {
            if pool.state(tid) != Some(ThreadState::Ready) {
                continue;
            }
            acc += u64::from(pool.get(tid).expect("tid en lista sin TCB").tickets);
            if acc >= winner {
                elegido = Some(i);
                break;
            }
        }

        let i = elegido?;
        let tid = self.list.remove(i);
        pool.get_mut(tid).expect("tid en lista sin TCB").state = ThreadState::Running;
        Some(tid)
    }

    pub(crate) fn remove(&mut self, tid: MyThreadId) {
        self.list.retain(|&id| id != tid);
    }

    pub(crate) fn contains(&self, tid: MyThreadId) -> bool {
        self.list.contains(&tid)
    }
}
