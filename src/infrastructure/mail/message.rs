use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};

use crate::entities::email::{strip_line_breaks, EmailMessage, Mailbox};

/// Raw bytes per encoded-word; keeps each word under the 75 char limit.
const ENCODED_WORD_BYTES: usize = 45;

/// Line length of the base64 body, well under the 998 octet SMTP limit.
const BODY_LINE_CHARS: usize = 76;

/// RFC 5322 specials; an ASCII display name holding any of them is quoted.
const SPECIALS: &[char] = &['(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"'];

/// RFC 2047 encoded-words for non-ASCII header text, folded onto
/// continuation lines when the text needs more than one word.
pub fn encode_header_text(value: &str) -> String {
    let value = strip_line_breaks(value);
    if value.is_ascii() {
        return value;
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in value.chars() {
        if chunk.len() + c.len_utf8() > ENCODED_WORD_BYTES {
            words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(chunk.as_bytes())));
            chunk.clear();
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(chunk.as_bytes())));
    }
    words.join("\r\n ")
}

/// Display name as a header phrase: plain atoms as-is, specials inside a
/// quoted-string, anything non-ASCII as encoded-words.
fn display_name(name: &str) -> String {
    let name = strip_line_breaks(name);
    if !name.is_ascii() {
        return encode_header_text(&name);
    }
    if !name.contains(SPECIALS) {
        return name;
    }

    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

pub fn mailbox_header(mailbox: &Mailbox) -> String {
    match &mailbox.name {
        Some(name) => format!("{} <{}>", display_name(name), mailbox.address),
        None => mailbox.address.clone(),
    }
}

fn map_lines(text: &str, stuff: bool) -> String {
    let mut out = String::with_capacity(text.len() + 64);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        if stuff && line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
    }
    out
}

pub fn to_crlf(text: &str) -> String {
    map_lines(text, false)
}

/// Doubles leading dots so no line can end the SMTP DATA stream early.
pub fn dot_stuff(text: &str) -> String {
    map_lines(text, true)
}

/// Base64 of the CRLF-normalized body, broken into short lines.
pub fn encode_body(text: &str) -> String {
    let encoded = STANDARD.encode(to_crlf(text).as_bytes());
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BODY_LINE_CHARS * 2);
    let mut rest = encoded.as_str();
    while rest.len() > BODY_LINE_CHARS {
        let (line, tail) = rest.split_at(BODY_LINE_CHARS);
        out.push_str(line);
        out.push_str("\r\n");
        rest = tail;
    }
    out.push_str(rest);
    out
}

/// Full RFC 5322 message: headers, blank line, base64 body, all CRLF.
///
/// Neither dot-stuffing nor the DATA terminator is applied here.
pub fn format_message(email: &EmailMessage, date: DateTime<Utc>, mailer_id: &str) -> String {
    let mut msg = String::with_capacity(email.html_body.len() * 4 / 3 + 512);
    msg.push_str(&format!("From: {}\r\n", mailbox_header(&email.from)));
    msg.push_str(&format!("To: {}\r\n", mailbox_header(&email.to)));
    msg.push_str(&format!("Reply-To: {}\r\n", mailbox_header(&email.reply_to)));
    msg.push_str(&format!("Subject: {}\r\n", encode_header_text(&email.subject)));
    msg.push_str(&format!("Date: {}\r\n", date.to_rfc2822()));
    msg.push_str("MIME-Version: 1.0\r\n");
    msg.push_str("Content-Type: text/html; charset=UTF-8\r\n");
    msg.push_str("Content-Transfer-Encoding: base64\r\n");
    msg.push_str(&format!("X-Mailer: {}\r\n", mailer_id));
    msg.push_str("\r\n");
    msg.push_str(&encode_body(&email.html_body));
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::contact::{Subject, Submission};
    use crate::mail::template::render_contact_email;
    use chrono::TimeZone;

    fn decode_body(body: &str) -> String {
        let joined: String = body.split("\r\n").collect();
        String::from_utf8(STANDARD.decode(joined).unwrap()).unwrap()
    }

    fn email() -> EmailMessage {
        EmailMessage {
            from: Mailbox::new("Site", "noreply@example.com"),
            to: Mailbox::address_only("contato@example.com"),
            reply_to: Mailbox::new("Maria", "maria@example.com"),
            subject: "[Site] Outro assunto — Maria".into(),
            html_body: "<p>oi</p>\n.hidden\nfim".into(),
        }
    }

    #[test]
    fn ascii_headers_pass_through() {
        assert_eq!(encode_header_text("Hello"), "Hello");
        assert_eq!(encode_header_text("a\r\nBcc: x"), "aBcc: x");
    }

    #[test]
    fn non_ascii_headers_are_encoded_words() {
        let encoded = encode_header_text("Mesa Hermética");
        assert!(encoded.starts_with("=?UTF-8?B?"));
        let inner = encoded.trim_start_matches("=?UTF-8?B?").trim_end_matches("?=");
        assert_eq!(STANDARD.decode(inner).unwrap(), "Mesa Hermética".as_bytes());
    }

    #[test]
    fn long_non_ascii_headers_fold_into_several_words() {
        let subject = "[Mesa Hermética] Dúvida sobre a Mesa Radiônica — Maria da Conceição";
        let encoded = encode_header_text(subject);

        let decoded: Vec<u8> = encoded
            .split("\r\n ")
            .flat_map(|word| {
                assert!(word.len() <= 75, "encoded word too long: {word}");
                let inner = word.trim_start_matches("=?UTF-8?B?").trim_end_matches("?=");
                STANDARD.decode(inner).unwrap()
            })
            .collect();
        assert_eq!(String::from_utf8(decoded).unwrap(), subject);
    }

    #[test]
    fn body_lines_starting_with_dot_are_stuffed() {
        assert_eq!(dot_stuff(".\r\nok\n..x"), "..\r\nok\r\n...x");
        assert_eq!(to_crlf(".\r\nok\n..x"), ".\r\nok\r\n..x");
    }

    #[test]
    fn message_has_headers_blank_line_and_body() {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let msg = format_message(&email(), date, "ContactBackend/test");

        let (headers, body) = msg.split_once("\r\n\r\n").unwrap();
        assert!(headers.starts_with("From: Site <noreply@example.com>\r\n"));
        assert!(headers.contains("\r\nTo: contato@example.com\r\n"));
        assert!(headers.contains("\r\nReply-To: Maria <maria@example.com>\r\n"));
        assert!(headers.contains("\r\nSubject: =?UTF-8?B?"));
        assert!(headers.contains("\r\nMIME-Version: 1.0\r\n"));
        assert!(headers.contains("\r\nContent-Type: text/html; charset=UTF-8\r\n"));
        assert!(headers.contains("\r\nContent-Transfer-Encoding: base64\r\n"));
        assert!(headers.ends_with("X-Mailer: ContactBackend/test"));
        assert_eq!(decode_body(body), "<p>oi</p>\r\n.hidden\r\nfim");
    }

    #[test]
    fn display_names_with_specials_are_quoted() {
        let quoted = |name: &str| mailbox_header(&Mailbox::new(name, "ana@example.com"));

        assert_eq!(quoted("Ana Silva"), "Ana Silva <ana@example.com>");
        assert_eq!(quoted("Silva, Maria"), "\"Silva, Maria\" <ana@example.com>");
        assert_eq!(
            quoted("Ana <attacker@evil.example>, Silva"),
            "\"Ana <attacker@evil.example>, Silva\" <ana@example.com>"
        );
        assert_eq!(quoted(r#"Ana "A\B""#), r#""Ana \"A\\B\"" <ana@example.com>"#);
        assert!(quoted("José <x@evil.example>").starts_with("=?UTF-8?B?"));
    }

    #[test]
    fn longest_valid_message_keeps_data_lines_short() {
        let message = format!("{}fim.", "palavra ".repeat(249));
        let submission = Submission {
            name: "Maria Silva".into(),
            email: "maria@example.com".into(),
            phone: String::new(),
            subject: Subject::Outro,
            message: message.clone(),
        };
        let email = EmailMessage {
            html_body: render_contact_email("Mesa Hermética", &submission),
            ..email()
        };

        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let data = dot_stuff(&format_message(&email, date, "ContactBackend/test"));

        let longest = data.split("\r\n").map(str::len).max().unwrap();
        assert!(longest <= 998, "line of {longest} octets in DATA");

        let (_, body) = data.split_once("\r\n\r\n").unwrap();
        assert!(decode_body(body).contains(&message));
    }
}
