//! Call frames.

use std::sync::Arc;

use crate::object::Closure;

/// Per-call execution context: the active closure, the instruction pointer
/// into its function body, and the operand-stack index where the frame's
/// locals begin (parameters are the first locals).
#[derive(Debug)]
pub struct Frame {
    closure: Arc<Closure>,
    /// Byte offset of the next instruction to fetch.
    pub ip: usize,
    /// Operand-stack index where the local window starts.
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Arc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: 0,
            base_pointer,
        }
    }

    /// The instruction stream this frame executes.
    pub fn instructions(&self) -> &Arc<[u8]> {
        &self.closure.function.instructions
    }

    /// The closure this frame is running; `GetFree` reads its captures.
    pub fn closure(&self) -> &Arc<Closure> {
        &self.closure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Op, make};
    use crate::object::CompiledFunction;

    #[test]
    fn frame_starts_at_the_first_byte() {
        let function = Arc::new(CompiledFunction {
            instructions: make(Op::Return, &[]).into(),
            num_locals: 0,
            num_parameters: 0,
        });
        let closure = Arc::new(Closure {
            function,
            free: vec![],
        });
        let frame = Frame::new(closure, 7);
        assert_eq!(frame.ip, 0);
        assert_eq!(frame.base_pointer, 7);
        assert_eq!(frame.instructions().len(), 1);
    }
}
