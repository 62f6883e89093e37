// tests/mutex_traspaso.rs
//
// Traspaso directo del mutex: al liberar con esperas pendientes, el primero
// de la cola pasa a ser el dueño sin que el mutex quede libre entre medio.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use hilos::*;

static B_VIO_LOCKED: AtomicBool = AtomicBool::new(false);
static B_VIO_OWNER: AtomicUsize = AtomicUsize::new(usize::MAX);
static B_VIO_WAITERS: AtomicUsize = AtomicUsize::new(usize::MAX);

fn main() {
    let rr = rr_init(100);
    init_runtime(rr);

    let m_ptr: *mut MyMutex = Box::leak(Box::new(MyMutex::new()));

    // El main (hilo A) toma el mutex.
    assert_eq!(my_mutex_lock(unsafe { &mut *m_ptr }), 0);
    assert_eq!(unsafe { &*m_ptr }.owner(), Some(0));

    let b = my_thread_create(
        move || {
            // Queda bloqueado: lo toma el main. Al reanudar ya es el dueño.
            assert_eq!(my_mutex_lock(unsafe { &mut *m_ptr }), 0);
            let m = unsafe { &*m_ptr };
            B_VIO_LOCKED.store(m.is_locked(), Ordering::Relaxed);
            B_VIO_OWNER.store(m.owner().unwrap_or(usize::MAX), Ordering::Relaxed);
            B_VIO_WAITERS.store(m.waiters_len(), Ordering::Relaxed);
            assert_eq!(my_mutex_unlock(unsafe { &mut *m_ptr }), 0);
        },
        rr,
        0,
        0,
        0,
    );
    assert!(b >= 0);
    let b = b as MyThreadId;

    // B corre hasta quedar en la cola de espera del mutex.
    my_thread_yield();
    assert_eq!(my_thread_state(b), Some(ThreadState::Blocked));
    assert_eq!(unsafe { &*m_ptr }.waiters_len(), 1);

    // Mientras el mutex está tomado, destroy debe rechazarse.
    assert_eq!(my_mutex_destroy(unsafe { &mut *m_ptr }), -1);

    // El unlock traspasa el mutex directamente a B.
    assert_eq!(my_mutex_unlock(unsafe { &mut *m_ptr }), 0);
    {
        let m = unsafe { &*m_ptr };
        assert!(m.is_locked());
        assert_eq!(m.owner(), Some(b));
        assert_eq!(m.waiters_len(), 0);
    }
    assert_eq!(my_thread_state(b), Some(ThreadState::Ready));

    my_thread_join(b);
    assert!(B_VIO_LOCKED.load(Ordering::Relaxed));
    assert_eq!(B_VIO_OWNER.load(Ordering::Relaxed), b);
    assert_eq!(B_VIO_WAITERS.load(Ordering::Relaxed), 0);
    assert!(!unsafe { &*m_ptr }.is_locked());

    // lock/unlock sin contención deja el mutex como estaba.
    assert_eq!(my_mutex_lock(unsafe { &mut *m_ptr }), 0);
    assert_eq!(my_mutex_unlock(unsafe { &mut *m_ptr }), 0);
    assert_eq!(unsafe { &*m_ptr }.owner(), None);
    assert_eq!(my_mutex_destroy(unsafe { &mut *m_ptr }), 0);
    println!("mutex_traspaso: OK");
}
