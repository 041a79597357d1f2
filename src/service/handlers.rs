//! clipkeep - Request handlers
//!
//! One handler per protocol operation, dispatched by the socket server.
//! Each returns a status line and the raw response body.

use crate::clipboard::models::{strip_terminator, Target};
use crate::clipboard::source::ClipSelection;
use crate::history::store::Tier;

use super::protocol::{Request, Status};
use super::Service;

impl Service {
    pub(crate) async fn dispatch(&self, request: Request) -> (Status, Vec<u8>) {
        match request {
            Request::List => self.handle_list(),
            Request::Copy { line, selections } => self.handle_copy(&line, &selections).await,
            Request::Print { line, unindent } => self.handle_print(&line, unindent),
            Request::Clear { pattern, tier } => self.handle_clear(&pattern, tier),
            Request::ClearAll { tier } => self.handle_clear_all(tier),
        }
    }

    fn handle_list(&self) -> (Status, Vec<u8>) {
        log::debug!("listing selections");
        let mut body = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.store().lock().list(&mut body);
        (Status::ok(), body)
    }

    /// Resolve the line, promote it, and put it back on the OS clipboard
    async fn handle_copy(&self, line: &[u8], selections: &[ClipSelection]) -> (Status, Vec<u8>) {
        let resolved = self.store().lock().copy(line);
        let Some(selection) = resolved else {
            log::info!("copy: no match for the requested line");
            return (Status::found(false), Vec::new());
        };

        for clip in selections {
            log::info!(
                "copying {} bytes to {} as {}",
                selection.content.len(),
                clip,
                selection.target
            );
            if let Err(err) = self
                .source()
                .write(*clip, &selection.target, &selection.content)
                .await
            {
                log::error!("failed to write selection to {}: {}", clip, err);
                return (
                    Status::error(format!("failed to write selection: {err}")),
                    Vec::new(),
                );
            }
        }
        (Status::found(true), Vec::new())
    }

    fn handle_print(&self, line: &[u8], unindent: bool) -> (Status, Vec<u8>) {
        let store = self.store().lock();
        let Some(selection) = store.find_match(line) else {
            log::info!("print: no match for the requested line");
            return (Status::found(false), Vec::new());
        };

        let body = if unindent && selection.target != Target::ImagePng {
            unindent_bytes(&selection.content)
        } else {
            selection.content.clone()
        };
        (Status::found(true), body)
    }

    fn handle_clear(&self, pattern: &[u8], tier: Tier) -> (Status, Vec<u8>) {
        log::info!("clearing selections matching a line in tier {:?}", tier);
        let cleared = match strip_terminator(pattern) {
            Some(pattern) => self.store().lock().clear(pattern, tier),
            None => false,
        };
        (Status::cleared(cleared), Vec::new())
    }

    fn handle_clear_all(&self, tier: Tier) -> (Status, Vec<u8>) {
        log::info!("clearing all selections in tier {:?}", tier);
        self.store().lock().clear_all(tier);
        (Status::ok(), Vec::new())
    }
}

/// Strip the indentation detected on the first line from every line.
/// Useful when previewing a selection copied out of indented code.
fn unindent_bytes(content: &[u8]) -> Vec<u8> {
    let body = content.strip_suffix(b"\n").unwrap_or(content);
    let mut out = Vec::with_capacity(content.len());
    let mut detected: Option<usize> = None;

    for line in body.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let indent = line
            .iter()
            .position(|&b| b != b' ' && b != b'\t')
            .unwrap_or(0);
        let detected = *detected.get_or_insert(indent);
        out.extend_from_slice(&line[detected.min(indent)..]);
        out.push(b'\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unindent_uses_the_first_line_as_reference() {
        let input = b"    fn main() {\n        body\n    }\n";
        assert_eq!(
            unindent_bytes(input),
            b"fn main() {\n    body\n}\n".to_vec()
        );
    }

    #[test]
    fn unindent_keeps_shallower_lines_intact() {
        let input = b"        deep\nshallow\n";
        assert_eq!(unindent_bytes(input), b"deep\nshallow\n".to_vec());
    }

    #[test]
    fn unindent_handles_missing_trailing_newline() {
        assert_eq!(unindent_bytes(b"  a\n  b"), b"a\nb\n".to_vec());
    }

    #[test]
    fn unindent_treats_blank_lines_as_unindented() {
        // A first line of pure whitespace sets the reference to zero.
        let input = b"\n  a\n";
        assert_eq!(unindent_bytes(input), b"\n  a\n".to_vec());
    }
}
