// src/pool.rs

use crate::tcb::{MyThreadId, Tcb, ThreadState};

/// Registro global de hilos: secuencia append-only de todos los TCB creados
/// en el proceso.
///
/// Los TCB nunca se eliminan; la terminación solo cambia el estado. Eso hace
/// posible consultar por tid después de terminado (join tardío) y garantiza
/// que ninguna pila se libere mientras el proceso viva. Cada TCB va en `Box`
/// para que su dirección sea estable aunque el vector crezca: el contexto
/// guardado de un hilo suspendido debe seguir siendo válido.
pub(crate) struct ThreadPool {
    threads: Vec<Box<Tcb>>,
}

impl ThreadPool {
    pub(crate) fn new() -> Self {
        ThreadPool { threads: Vec::new() }
    }

    /// Siguiente tid a asignar: los tids crecen monótonamente y coinciden con
    /// la posición en el registro.
    pub(crate) fn next_tid(&self) -> MyThreadId {
        self.threads.len()
    }

    /// Registra un TCB ya construido. Su tid debe ser el que entregó
    /// `next_tid`.
    pub(crate) fn register(&mut self, tcb: Tcb) -> MyThreadId {
        debug_assert_eq!(tcb.tid, self.threads.len());
        let tid = tcb.tid;
        self.threads.push(Box::new(tcb));
        tid
    }

    pub(crate) fn get(&self, tid: MyThreadId) -> Option<&Tcb> {
        self.threads.get(tid).map(|t| t.as_ref())
    }

    pub(crate) fn get_mut(&mut self, tid: MyThreadId) -> Option<&mut Tcb> {
        self.threads.get_mut(tid).map(|t| t.as_mut())
    }

    pub(crate) fn state(&self, tid: MyThreadId) -> Option<ThreadState> {
        self.get(tid).map(|t| t.state)
    }

    pub(crate) fn len(&self) -> usize {
        self.threads.len()
    }

    /// Cantidad de hilos con estado distinto de Terminated.
    pub(crate) fn alive_count(&self) -> usize {
        self.threads
            .iter()
            .filter(|t| t.state != ThreadState::Terminated)
            .count()
    }
}
