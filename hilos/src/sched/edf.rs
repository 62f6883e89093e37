// src/sched/edf.rs

use crate::pool::ThreadPool;
use crate::sched::Admission;
use crate::tcb::{MyThreadId, ThreadState};

/// Scheduler Earliest-Deadline-First.
///
/// Los deadlines son enteros de urgencia en milisegundos comparados por
/// valor crudo (menor = más urgente); el runtime no les suma reloj de pared.
/// Empates quedan resueltos por orden de admisión. La lista retiene a todos
/// los admitidos, incluido el que ejecuta, hasta que terminan o se remueven;
/// no arma timer: la preempción ocurre solo en la admisión o en cesiones
/// voluntarias.
pub(crate) struct Edf {
    list: Vec<MyThreadId>,
}

impl Edf {
    pub(crate) fn new() -> Self {
        Edf { list: Vec::new() }
    }

    /// Admite `tid`; si hay un hilo ejecutando y el recién llegado es
    /// estrictamente más urgente, pide la preempción por admisión.
    pub(crate) fn enqueue(
        &mut self,
        pool: &mut ThreadPool,
        current: Option<MyThreadId>,
        tid: MyThreadId,
    ) -> Admission {
        if let Some(t) = pool.get_mut(tid) {
            t.state = ThreadState::Ready;
        }
        if !self.list.contains(&tid) {
            self.list.push(tid);
        }

        if let Some(cur) = current {
            if pool.state(cur) == Some(ThreadState::Running) {
                let cur_deadline = pool.get(cur).expect("current sin TCB").deadline;
                let new_deadline = pool.get(tid).expect("tid admitido sin TCB").deadline;
                if new_deadline < cur_deadline {
                    return Admission::Preempt;
                }
            }
        }
        Admission::Queued
    }

    pub(crate) fn pick_next(&mut self, pool: &mut ThreadPool) -> Option<MyThreadId> {
        // Los terminados dejan de estar admitidos; el resto permanece.
        self.list
            .retain(|&tid| pool.state(tid) != Some(ThreadState::Terminated));

        let mut mejor: Option<(MyThreadId, i64)> = None;
        for &tid in &self.list {
            if pool.state(tid) != Some(ThreadState::Ready) {
                continue;
            }
            let deadline = pool.get(tid).expect("tid en lista sin TCB").deadline;
            match mejor {
                // El `<` estricto conserva al primero admitido en caso de empate.
                Some((_, d)) if deadline >= d => {}
                _ => mejor = Some((tid, deadline)),
            }
        }

        let (tid, _) = mejor?;
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
