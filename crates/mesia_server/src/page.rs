/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! The page is the template followed by the offer assigned to a script
//! variable. The template must leave a `<script>` element open.

pub const PAGE_TRAILER: &str = "</script>\n</body>\n</html>\n";

/// Quotes `s` as a JavaScript string literal that is safe inside a `<script>` element.
pub fn js_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    out.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '<' if chars.peek() == Some(&'/') => out.push_str("<\\"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub fn render_page(template: &str, sdp: &str) -> String {
    let mut body = String::with_capacity(template.len() + sdp.len() + 64);
    body.push_str(template);
    body.push_str("sdp = ");
    body.push_str(&js_string_literal(sdp));
    body.push_str(";\n");
    body.push_str(PAGE_TRAILER);
    body
}
