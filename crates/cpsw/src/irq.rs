/// The subsystem's single interrupt output.
pub trait IrqLine: Send {
    fn set_level(&mut self, level: bool);

    /// Raises and immediately lowers the line.
    fn pulse(&mut self) {
        self.set_level(true);
        self.set_level(false);
    }
}

/// Unconnected line.
impl IrqLine for () {
    fn set_level(&mut self, _level: bool) {}
}

impl<T: IrqLine + ?Sized> IrqLine for Box<T> {
    fn set_level(&mut self, level: bool) {
        (**self).set_level(level);
    }

    fn pulse(&mut self) {
        (**self).pulse();
    }
}

impl<T: IrqLine + ?Sized> IrqLine for std::sync::Arc<std::sync::Mutex<T>> {
    fn set_level(&mut self, level: bool) {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .set_level(level);
    }

    fn pulse(&mut self) {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pulse();
    }
}

/// Records every edge; handy for tests and tracing host glue.
#[derive(Debug, Default, Clone)]
pub struct IrqRecorder {
    pub level: bool,
    pub edges: Vec<bool>,
}

impl IrqRecorder {
    /// Number of completed high pulses seen so far.
    pub fn pulses(&self) -> usize {
        self.edges
            .windows(2)
            .filter(|pair| pair[0] && !pair[1])
            .count()
    }
}

impl IrqLine for IrqRecorder {
    fn set_level(&mut self, level: bool) {
        self.level = level;
        self.edges.push(level);
    }
}
