// src/sched/mod.rs

pub(crate) mod edf;
pub(crate) mod lottery;
pub(crate) mod rr;

use crate::pool::ThreadPool;
use crate::tcb::MyThreadId;

pub(crate) use edf::Edf;
pub(crate) use lottery::Lottery;
pub(crate) use rr::RoundRobin;

/// Identificador de un scheduler registrado en el runtime.
pub type SchedulerId = usize;

/// Resultado de admitir un hilo: `Preempt` pide al dispatcher un cambio de
/// contexto inmediato (preempción por admisión, solo EDF la produce).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Admission {
    Queued,
    Preempt,
}

/// Contrato polimórfico de scheduling: encolar, elegir siguiente y remover.
///
/// El conjunto de políticas es cerrado, así que el despacho va por `match`
/// sobre una variante etiquetada en lugar de punteros a función. Ninguna
/// operación bloquea ni hace I/O; todas trabajan sobre el pool compartido y
/// la estructura privada de la política.
pub(crate) enum Policy {
    RoundRobin(RoundRobin),
    Lottery(Lottery),
    Edf(Edf),
}

impl Policy {
    /// Admite `tid` como Ready en la estructura de la política. Admitir un
    /// tid ya presente es un no-op (la admisión es idempotente).
    pub(crate) fn enqueue(
        &mut self,
        pool: &mut ThreadPool,
        current: Option<MyThreadId>,
        tid: MyThreadId,
    ) -> Admission {
        match self {
            Policy::RoundRobin(rr) => rr.enqueue(pool, tid),
            Policy::Lottery(ls) => ls.enqueue(pool, tid),
            Policy::Edf(edf) => edf.enqueue(pool, current, tid),
        }
    }

    /// Elige el siguiente hilo a ejecutar y lo marca Running, o `None` si no
    /// hay ningún Ready.
    pub(crate) fn pick_next(
        &mut self,
        pool: &mut ThreadPool,
        current: Option<MyThreadId>,
    ) -> Option<MyThreadId> {
        match self {
            Policy::RoundRobin(rr) => rr.pick_next(pool),
            Policy::Lottery(ls) => ls.pick_next(pool, current),
            Policy::Edf(edf) => edf.pick_next(pool),
        }
    }

    /// Remueve `tid` de la estructura si está presente; no-op si no.
    pub(crate) fn remove(&mut self, tid: MyThreadId) {
        match self {
            Policy::RoundRobin(rr) => rr.remove(tid),
            Policy::Lottery(ls) => ls.remove(tid),
            Policy::Edf(edf) => edf.remove(tid),
        }
    }

    pub(crate) fn contains(&self, tid: MyThreadId) -> bool {
        match self {
            Policy::RoundRobin(rr) => rr.contains(tid),
            Policy::Lottery(ls) => ls.contains(tid),
            Policy::Edf(edf) => edf.contains(tid),
        }
    }

    /// Quantum del timer periódico; `None` para EDF, que no arma timer.
    pub(crate) fn quantum_ms(&self) -> Option<u32> {
        match self {
            Policy::RoundRobin(rr) => Some(rr.quantum_ms),
            Policy::Lottery(ls) => Some(ls.quantum_ms),
            Policy::Edf(_) => None,
        }
    }

    /// Etiqueta de política activa que leen los colaboradores:
    /// 0 = EDF, 1 = RR, 2 = Lottery.
    pub(crate) fn tag(&self) -> i32 {
        match self {
            Policy::Edf(_) => 0,
            Policy::RoundRobin(_) => 1,
            Policy::Lottery(_) => 2,
        }
    }
}
