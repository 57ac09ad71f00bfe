//! Output presentation adapter.
//!
//! Two read-only views of the current result: a sandboxed visual preview
//! and the raw HTML, plus a one-shot print flow that opens the rendered
//! document in a separate presentation context. The adapter only ever reads
//! [`RenderResult`]; the type itself guarantees rendered HTML and an error
//! message are never shown together.

use ejslab_engine::pipeline::RenderResult;
use ejslab_engine::template::escape_html;

/// Delay before the print document invokes the native print action, giving
/// the opened context time to finish layout.
pub const PRINT_LAYOUT_DELAY_MS: u64 = 250;

/// Wrap rendered HTML for the visual preview: an inert frame whose content
/// cannot reach the embedding page's state.
pub fn preview_frame(html: &str) -> String {
    format!(
        r#"<iframe sandbox="allow-same-origin" title="preview" srcdoc="{}"></iframe>"#,
        escape_html(html)
    )
}

/// A minimal standalone document wrapping `html` that triggers the native
/// print action once layout has had a moment to settle.
pub fn print_document(html: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>EJSLab</title></head>\n<body>\n{}\n<script>setTimeout(function () {{ window.print(); }}, {});</script>\n</body>\n</html>\n",
        html, PRINT_LAYOUT_DELAY_MS
    )
}

/// One-shot print flow: persist the standalone document and hand it to the
/// platform opener. A blocked or missing opener is a no-op, not an error;
/// so is a failed result (there is nothing to print).
pub fn print(result: &RenderResult) {
    let Some(html) = result.html() else {
        log::debug!("print requested with no rendered output; skipping");
        return;
    };
    let document = print_document(html);

    let file = match tempfile::Builder::new()
        .prefix("ejslab-print-")
        .suffix(".html")
        .tempfile()
    {
        Ok(file) => file,
        Err(e) => {
            log::warn!("print: cannot create document file: {}", e);
            return;
        }
    };
    if let Err(e) = std::fs::write(file.path(), document) {
        log::warn!("print: cannot write document: {}", e);
        return;
    }
    // The opened context owns the file from here; keep it past our exit.
    let path = match file.keep() {
        Ok((_, path)) => path,
        Err(e) => {
            log::warn!("print: cannot keep document file: {}", e);
            return;
        }
    };
    if let Err(e) = open::that(&path) {
        log::warn!("print: opener unavailable: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_document_wraps_html_and_schedules_print() {
        let doc = print_document("<h1>Report</h1>");
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<h1>Report</h1>"));
        assert!(doc.contains("window.print()"));
        assert!(doc.contains(&PRINT_LAYOUT_DELAY_MS.to_string()));
    }

    #[test]
    fn test_preview_frame_is_sandboxed_and_escaped() {
        let frame = preview_frame(r#"<script>alert("x")</script>"#);
        assert!(frame.contains("sandbox="));
        // The payload must not terminate the srcdoc attribute early.
        assert!(!frame.contains(r#"srcdoc="<script"#));
        assert!(frame.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_print_failed_result_is_noop() {
        // Must not create files or panic.
        print(&RenderResult::Failed {
            message: "boom".into(),
        });
    }
}
