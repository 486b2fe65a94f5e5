// ── Labels ──
//
// A label is one unit of caller work: an optional image, how it reaches
// the node, what to do with the job's sectors, and who to tell when the
// node finishes inspecting it.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use inspect_api::node::models::Sector;

use crate::bitmap;
use crate::model::repeat::Repeat;

/// Callback invoked once with the finished repeat.
pub type RepeatCallback = Box<dyn Fn(Arc<Repeat>) + Send + Sync>;

/// How a label's image reaches the node, and whether sectors are learned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelHandler {
    /// Physical print, camera captures; job sectors used as-is.
    CameraTrigger,
    /// Physical print, camera captures; sectors are auto-detected.
    CameraDetect,
    /// Simulator capture; job sectors used as-is.
    SimulatorTrigger,
    /// Simulator capture; sectors are auto-detected.
    SimulatorDetect,
}

impl LabelHandler {
    pub fn is_detect(self) -> bool {
        matches!(self, Self::CameraDetect | Self::SimulatorDetect)
    }

    /// Raw triggers inspect the job as loaded, without touching sectors.
    pub fn is_trigger(self) -> bool {
        matches!(self, Self::CameraTrigger | Self::SimulatorTrigger)
    }
}

/// What to do with the job's sectors before inspecting.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SectorIntent {
    #[default]
    Untouched,
    AutoDetect,
    /// Recreate exactly these sectors, in order.
    Restore(Vec<Sector>),
}

impl From<Option<Vec<Sector>>> for SectorIntent {
    /// `None` leaves sectors alone; an empty list asks for detection.
    fn from(sectors: Option<Vec<Sector>>) -> Self {
        match sectors {
            None => Self::Untouched,
            Some(list) if list.is_empty() => Self::AutoDetect,
            Some(list) => Self::Restore(list),
        }
    }
}

/// One label handed to the controller.
pub struct Label {
    pub image: Option<Bytes>,
    pub dpi: Option<u32>,
    pub handler: LabelHandler,
    /// Grading table to enable on learned sectors.
    pub table_id: Option<String>,
    pub sectors: SectorIntent,
    on_repeat: Option<RepeatCallback>,
}

impl Label {
    pub fn new(handler: LabelHandler) -> Self {
        Self {
            image: None,
            dpi: None,
            handler,
            table_id: None,
            sectors: SectorIntent::Untouched,
            on_repeat: None,
        }
    }

    /// Attach an image. The dpi is read from a BMP header when present.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<Bytes>) -> Self {
        let image = image.into();
        if self.dpi.is_none() {
            self.dpi = bitmap::dpi_of(&image);
        }
        self.image = Some(image);
        self
    }

    #[must_use]
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = Some(dpi);
        self
    }

    #[must_use]
    pub fn with_table(mut self, table_id: impl Into<String>) -> Self {
        self.table_id = Some(table_id.into());
        self
    }

    #[must_use]
    pub fn with_sectors(mut self, intent: SectorIntent) -> Self {
        self.sectors = intent;
        self
    }

    #[must_use]
    pub fn on_repeat(mut self, callback: impl Fn(Arc<Repeat>) + Send + Sync + 'static) -> Self {
        self.on_repeat = Some(Box::new(callback));
        self
    }

    /// Whether sectors are learned rather than restored.
    pub fn wants_detect(&self) -> bool {
        self.handler.is_detect() || self.sectors == SectorIntent::AutoDetect
    }

    pub(crate) fn notify(&self, repeat: Arc<Repeat>) {
        if let Some(ref cb) = self.on_repeat {
            cb(repeat);
        }
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Label")
            .field("image_len", &self.image.as_ref().map(Bytes::len))
            .field("dpi", &self.dpi)
            .field("handler", &self.handler)
            .field("table_id", &self.table_id)
            .field("sectors", &self.sectors)
            .field("on_repeat", &self.on_repeat.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_intent_from_option() {
        assert_eq!(SectorIntent::from(None), SectorIntent::Untouched);
        assert_eq!(SectorIntent::from(Some(vec![])), SectorIntent::AutoDetect);
        let restore = SectorIntent::from(Some(vec![Sector::default()]));
        assert!(matches!(restore, SectorIntent::Restore(ref v) if v.len() == 1));
    }

    #[test]
    fn detect_from_handler_or_intent() {
        assert!(Label::new(LabelHandler::CameraDetect).wants_detect());
        assert!(!Label::new(LabelHandler::CameraTrigger).wants_detect());
        assert!(
            Label::new(LabelHandler::SimulatorTrigger)
                .with_sectors(SectorIntent::AutoDetect)
                .wants_detect()
        );
    }

    #[test]
    fn explicit_dpi_wins_over_header() {
        let mut bmp = vec![0_u8; 54];
        bmp[0] = b'B';
        bmp[1] = b'M';
        bitmap::set_dpi(&mut bmp, 300);

        let label = Label::new(LabelHandler::SimulatorTrigger).with_image(bmp.clone());
        assert_eq!(label.dpi, Some(300));

        let label = Label::new(LabelHandler::SimulatorTrigger)
            .with_dpi(600)
            .with_image(bmp);
        assert_eq!(label.dpi, Some(600));
    }
}
