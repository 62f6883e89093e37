// src/sched/rr.rs

use std::collections::VecDeque;

use crate::pool::ThreadPool;
use crate::sched::Admission;
use crate::tcb::{MyThreadId, ThreadState};

/// Scheduler Round Robin: cola FIFO de listos con quantum fijo.
///
/// El hilo elegido se reencola al final antes de entregarse, de modo que
/// sigue residente en la cola mientras ejecuta; cuando el timer lo preempta
/// no hace falta reencolarlo. El desempate es estrictamente por orden de
/// llegada.
pub(crate) struct RoundRobin {
    pub(crate) quantum_ms: u32,
    queue: VecDeque<MyThreadId>,
}

impl RoundRobin {
    pub(crate) fn new(quantum_ms: u32) -> Self {
        RoundRobin {
            quantum_ms,
            queue: VecDeque::new(),
        }
    }

    pub(crate) fn enqueue(&mut self, pool: &mut ThreadPool, tid: MyThreadId) -> Admission {
        if let Some(t) = pool.get_mut(tid) {
            t.state = ThreadState::Ready;
        }
        if !self.queue.contains(&tid) {
            self.queue.push_back(tid);
        }
        Admission::Queued
    }

    pub(crate) fn pick_next(&mut self, pool: &mut ThreadPool) -> Option<MyThreadId> {
        // Drena del frente los terminados. El hilo en ejecución puede estar
        // residente en la cola: no es elegible, pero rota al final en lugar
        // de perderse. Cada entrada se examina a lo sumo una vez.
        let mut vistos = 0;
        let n = self.queue.len();
        while vistos < n {
            vistos += 1;
            let tid = self.queue.pop_front()?;
            match pool.state(tid) {
                Some(ThreadState::Ready) => {
                    self.queue.push_back(tid);
                    pool.get_mut(tid).expect("tid en cola sin TCB").state = ThreadState::Running;
                    return Some(tid);
                }
                Some(ThreadState::Terminated) | None => {}
                _ => self.queue.push_back(tid),
            }
        }
        None
    }

    pub(crate) fn remove(&mut self, tid: MyThreadId) {
        self.queue.retain(|&id| id != tid);
    }

    pub(crate) fn contains(&self, tid: MyThreadId) -> bool {
        self.queue.contains(&tid)
    }
}
