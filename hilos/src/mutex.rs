// src/mutex.rs

use std::collections::{HashMap, VecDeque};

use crate::tcb::MyThreadId;

/// Mutex cooperativo, no recursivo, con cola FIFO de espera y traspaso
/// directo de dueño en unlock.
///
/// Lleva embebido el mapa de ocupación del canvas compartido: posiciones
/// (x, y) reclamadas por un hilo. El mapa es del colaborador de animación y
/// se muta con el mutex tomado; el runtime no interpreta su contenido, solo
/// garantiza que lock protege la bandera y el mapa como una sola unidad.
pub struct MyMutex {
    pub(crate) locked: bool,
    pub(crate) owner: Option<MyThreadId>,
    pub(crate) waiters: VecDeque<MyThreadId>,
    occupied: HashMap<(i32, i32), MyThreadId>,
}

impl MyMutex {
    pub fn new() -> Self {
        MyMutex {
            locked: false,
            owner: None,
            waiters: VecDeque::new(),
            occupied: HashMap::new(),
        }
    }

    /// Dueño actual del mutex, si está tomado.
    pub fn owner(&self) -> Option<MyThreadId> {
        self.owner
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn waiters_len(&self) -> usize {
        self.waiters.len()
    }

    // ----- Mapa de ocupación ----- //

    /// Marca la posición (x, y) como ocupada por `owner_tid`. Reclamar una
    /// posición ya ocupada la transfiere: la última escritura gana.
    pub fn occupy(&mut self, x: i32, y: i32, owner_tid: MyThreadId) {
        self.occupied.insert((x, y), owner_tid);
    }

    /// Libera (x, y) solo si el dueño registrado coincide con `owner_tid`.
    pub fn release(&mut self, x: i32, y: i32, owner_tid: MyThreadId) {
        if self.occupied.get(&(x, y)) == Some(&owner_tid) {
            self.occupied.remove(&(x, y));
        }
    }

    /// ¿Está (x, y) ocupada por un hilo distinto de `current_tid`? Una
    /// posición propia no cuenta como ocupada: el hilo puede re-dibujarse
    /// encima de sí mismo.
    pub fn is_occupied(&self, x: i32, y: i32, current_tid: MyThreadId) -> bool {
        match self.occupied.get(&(x, y)) {
            Some(&owner) => owner != current_tid,
            None => false,
        }
    }

    pub fn occupant(&self, x: i32, y: i32) -> Option<MyThreadId> {
        self.occupied.get(&(x, y)).copied()
    }

    pub fn occupied_len(&self) -> usize {
        self.occupied.len()
    }
}

impl Default for MyMutex {
    fn default() -> Self {
        MyMutex::new()
    }
}
