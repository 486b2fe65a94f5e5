// ── Print spooler seam ──
//
// Printer-fed labels leave the process through a caller-supplied spooler.
// Driver integration lives outside this crate.

use crate::error::CoreError;

/// Sends a label image to the printer feeding the node.
pub trait PrintSpooler: Send + Sync {
    /// Queue `image` for printing. `dpi` is the label's resolution when known.
    fn spool(&self, image: &[u8], dpi: Option<u32>) -> Result<(), CoreError>;
}

impl<F> PrintSpooler for F
where
    F: Fn(&[u8], Option<u32>) -> Result<(), CoreError> + Send + Sync,
{
    fn spool(&self, image: &[u8], dpi: Option<u32>) -> Result<(), CoreError> {
        self(image, dpi)
    }
}
