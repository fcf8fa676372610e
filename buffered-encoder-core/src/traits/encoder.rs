use crate::models::error::CaptureError;

/// Downstream consumer of raw PCM frames.
///
/// Frames arrive on the drain thread in non-decreasing `pts_us` order.
/// Errors are counted by the drain loop and never stop the session.
pub trait FrameEncoder: Send {
    fn encode(&mut self, data: &[u8], pts_us: u64) -> Result<(), CaptureError>;
}

impl<E: FrameEncoder + ?Sized> FrameEncoder for Box<E> {
    fn encode(&mut self, data: &[u8], pts_us: u64) -> Result<(), CaptureError> {
        (**self).encode(data, pts_us)
    }
}
