// src/tcb.rs

use std::mem;
use std::os::raw::c_void;
use std::ptr;

use libc::{getcontext, makecontext, sigdelset, ucontext_t, SIGALRM};

use crate::sched::SchedulerId;

/// Identificador de un hilo de usuario dentro del proceso.
pub type MyThreadId = usize;

/// Tamaño fijo de la pila de cada hilo: 64 KiB.
pub const STACK_SIZE: usize = 64 * 1024;

/// Estados posibles de un hilo de usuario.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ThreadState {
    Ready,
    Running,
    Blocked,
    Terminated,
}

/// Thread Control Block: toda la información de control de un hilo.
///
/// El contexto guardado (`ucontext_t`) y la pila propia permiten reanudar la
/// ejecución después de un `swapcontext`. La pila vive tanto como el TCB, y
/// el pool nunca descarta TCBs, así que ningún marco puede reanudarse sobre
/// memoria liberada.
pub(crate) struct Tcb {
    pub(crate) tid: MyThreadId,
    pub(crate) context: ucontext_t,
    pub(crate) stack: Vec<u8>,
    pub(crate) state: ThreadState,
    pub(crate) sched: Option<SchedulerId>,
    pub(crate) tickets: u32,
    pub(crate) priority: i32,
    pub(crate) deadline: i64,
    pub(crate) joiner: Option<MyThreadId>,
    pub(crate) detached: bool,
    pub(crate) entry: Option<Box<dyn FnOnce()>>,
}

impl Tcb {
    /// Adopta el contexto del proceso como hilo main (tid 0).
    ///
    /// El main usa la pila del proceso, por eso `stack` queda vacía. Con
    /// deadline 0 es el más urgente posible: la fase de preparación nunca es
    /// preemptada por una admisión EDF.
    pub(crate) fn main_thread() -> Self {
        let mut ctx: ucontext_t = unsafe { mem::zeroed() };
        unsafe {
            getcontext(&mut ctx);
        }

        Tcb {
            tid: 0,
            context: ctx,
            stack: Vec::new(),
            state: ThreadState::Running,
            sched: None,
            tickets: 0,
            priority: 0,
            deadline: 0,
            joiner: None,
            detached: false,
            entry: None,
        }
    }

    /// Crea un TCB nuevo con pila propia y contexto apuntando al trampolín.
    ///
    /// El trampolín ejecuta la rutina del hilo y llama a `my_thread_end`
    /// aunque la rutina retorne normalmente. Devuelve `None` si no se pudo
    /// reservar la pila (único modo de fallo reconocido).
    pub(crate) fn new(
        tid: MyThreadId,
        entry: Box<dyn FnOnce()>,
        tickets: u32,
        priority: i32,
        deadline: i64,
        trampoline: extern "C" fn(),
    ) -> Option<Self> {
        let mut stack: Vec<u8> = Vec::new();
        if stack.try_reserve_exact(STACK_SIZE).is_err() {
            return None;
        }
        stack.resize(STACK_SIZE, 0);

        let mut ctx: ucontext_t = unsafe { mem::zeroed() };
        unsafe {
            getcontext(&mut ctx);

            ctx.uc_stack.ss_sp = stack.as_mut_ptr() as *mut c_void;
            ctx.uc_stack.ss_size = STACK_SIZE;
            ctx.uc_link = ptr::null_mut();

            // El hilo debe arrancar con SIGALRM desbloqueada, sin importar la
            // máscara vigente en el momento de la creación.
            sigdelset(&mut ctx.uc_sigmask, SIGALRM);

            makecontext(&mut ctx, trampoline, 0);
        }

        Some(Tcb {
            tid,
            context: ctx,
            stack,
            state: ThreadState::Ready,
            sched: None,
            tickets,
            priority,
            deadline,
            joiner: None,
            detached: false,
            entry: Some(entry),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn dummy() {}

    #[test]
    fn test_main_thread() {
        let main = Tcb::main_thread();
        assert_eq!(main.tid, 0);
        assert_eq!(main.state, ThreadState::Running);
        assert!(main.stack.is_empty());
        assert!(main.sched.is_none());
        assert_eq!(main.deadline, 0);
    }

    #[test]
    fn test_nuevo_tcb() {
        let t = Tcb::new(3, Box::new(|| {}), 10, 0, 250, dummy).expect("sin memoria");
        assert_eq!(t.tid, 3);
        assert_eq!(t.state, ThreadState::Ready);
        assert_eq!(t.stack.len(), STACK_SIZE);
        assert_eq!(t.tickets, 10);
        assert_eq!(t.deadline, 250);
        assert!(!t.detached);
        assert!(t.entry.is_some());
    }
}
