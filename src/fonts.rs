use std::sync::OnceLock;

use plotters::style::{register_font, FontStyle};
use tracing::warn;

const SANS_SERIF: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Registers the bundled face as `sans-serif` for every plotters backend.
/// Safe to call before each drawing; only the first call does any work.
pub fn register_fonts() -> bool {
    static REGISTERED: OnceLock<bool> = OnceLock::new();
    *REGISTERED.get_or_init(|| {
        let loaded = register_font("sans-serif", FontStyle::Normal, SANS_SERIF).is_ok();
        if !loaded {
            warn!("bundled sans-serif font could not be loaded, plot labels will fail");
        }
        loaded
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotters::prelude::*;

    #[test]
    fn bundled_font_draws_text_on_bitmaps() {
        assert!(register_fonts());
        assert!(register_fonts());

        let mut buffer = vec![255u8; 80 * 30 * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (80, 30)).into_drawing_area();
            root.draw(&Text::new("PA1", (2, 2), ("sans-serif", 20.0))).unwrap();
            root.present().unwrap();
        }
        assert!(buffer.iter().any(|b| *b != 255));
    }
}
