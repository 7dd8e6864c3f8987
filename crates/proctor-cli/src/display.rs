//! Display surface and quit-key polling.

use image::RgbImage;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Key that ends the session gracefully.
pub const QUIT_KEY: char = 'q';

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("cannot install Ctrl-C handler: {0}")]
    SignalHandler(#[from] ctrlc::Error),
    #[cfg(feature = "preview")]
    #[error("preview window: {0}")]
    Window(#[from] opencv::Error),
}

/// What the loop should do after presenting a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Presents annotated frames and reports whether the user asked to quit.
///
/// Presentation and key polling are one call, so the poll also paces the loop.
pub trait Display {
    fn present(&mut self, image: &RgbImage) -> Result<Control, DisplayError>;
}

impl<T: Display + ?Sized> Display for Box<T> {
    fn present(&mut self, image: &RgbImage) -> Result<Control, DisplayError> {
        (**self).present(image)
    }
}

/// Flag raised by SIGINT. The handler can be installed once per process.
fn interrupt_flag() -> Result<Arc<AtomicBool>, DisplayError> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let on_signal = Arc::clone(&interrupted);
    ctrlc::set_handler(move || on_signal.store(true, Ordering::SeqCst))?;
    Ok(interrupted)
}

/// Decide whether to stop after a frame, given the key pressed (if any) and the
/// stop flag shared with the signal handler and stdin watcher.
fn control_for(key: Option<u8>, stop: &AtomicBool) -> Control {
    if key == Some(QUIT_KEY as u8) || stop.load(Ordering::SeqCst) {
        Control::Quit
    } else {
        Control::Continue
    }
}

/// Windowless display: frames are dropped, quit comes from stdin or Ctrl-C.
///
/// A line consisting of `q` on stdin, or SIGINT, requests a graceful stop.
pub struct HeadlessDisplay {
    quit: Arc<AtomicBool>,
}

impl HeadlessDisplay {
    pub fn new() -> Result<Self, DisplayError> {
        let quit = interrupt_flag()?;

        let on_stdin = Arc::clone(&quit);
        let spawned = std::thread::Builder::new()
            .name("proctor-stdin".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    if is_quit_command(&line) {
                        on_stdin.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "stdin watcher unavailable; use Ctrl-C to stop");
        }

        tracing::info!("running headless; type '{QUIT_KEY}' + Enter or press Ctrl-C to stop");
        Ok(Self { quit })
    }
}

impl Display for HeadlessDisplay {
    fn present(&mut self, _image: &RgbImage) -> Result<Control, DisplayError> {
        Ok(control_for(None, &self.quit))
    }
}

fn is_quit_command(line: &str) -> bool {
    let mut chars = line.trim().chars();
    chars.next() == Some(QUIT_KEY) && chars.next().is_none()
}

#[cfg(feature = "preview")]
pub use window::WindowDisplay;

#[cfg(feature = "preview")]
mod window {
    use super::{control_for, interrupt_flag, Control, Display, DisplayError};
    use image::RgbImage;
    use opencv::core::{Mat, Scalar, CV_8UC3};
    use opencv::highgui;
    use opencv::prelude::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    /// How long each present call waits for a key press.
    const KEY_WAIT_MS: i32 = 1;

    /// OpenCV highgui preview window. Ctrl-C stops the session like the quit key.
    pub struct WindowDisplay {
        name: String,
        interrupted: Arc<AtomicBool>,
    }

    impl WindowDisplay {
        pub fn open(name: &str) -> Result<Self, DisplayError> {
            let interrupted = interrupt_flag()?;
            highgui::named_window(name, highgui::WINDOW_AUTOSIZE)?;
            tracing::info!(window = name, "preview window opened");
            Ok(Self {
                name: name.to_string(),
                interrupted,
            })
        }
    }

    impl Display for WindowDisplay {
        fn present(&mut self, image: &RgbImage) -> Result<Control, DisplayError> {
            let mut mat = Mat::new_rows_cols_with_default(
                image.height() as i32,
                image.width() as i32,
                CV_8UC3,
                Scalar::all(0.0),
            )?;
            // highgui expects BGR.
            let dst = mat.data_bytes_mut()?;
            for (d, s) in dst.chunks_exact_mut(3).zip(image.as_raw().chunks_exact(3)) {
                d[0] = s[2];
                d[1] = s[1];
                d[2] = s[0];
            }

            highgui::imshow(&self.name, &mat)?;
            let key = highgui::wait_key(KEY_WAIT_MS)?;
            let pressed = (key >= 0).then_some((key & 0xFF) as u8);
            Ok(control_for(pressed, &self.interrupted))
        }
    }

    impl Drop for WindowDisplay {
        fn drop(&mut self) {
            if let Err(e) = highgui::destroy_window(&self.name) {
                tracing::warn!(error = %e, "failed to close preview window");
            }
        }
    }
}
