//! Email rendering: subject, signature block, plaintext and HTML bodies.

use super::Sender;

pub fn subject(job_title: &str, full_name: &str) -> String {
    format!("Application for {job_title} - {full_name}")
}

/// `CV_Ada_Lovelace.pdf`
pub fn attachment_filename(full_name: &str) -> String {
    let joined = full_name.split_whitespace().collect::<Vec<_>>().join("_");
    if joined.is_empty() {
        "CV.pdf".to_string()
    } else {
        format!("CV_{joined}.pdf")
    }
}

fn signature_lines(sender: &Sender) -> Vec<String> {
    let mut lines = vec![
        "Kind regards,".to_string(),
        sender.full_name.clone(),
        sender.email.clone(),
    ];
    if let Some(phone) = sender.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        lines.push(format!("Tel: {phone}"));
    }
    lines
}

pub fn text_body(letter: &str, sender: &Sender, job_url: Option<&str>) -> String {
    let mut out = String::with_capacity(letter.len() + 128);
    out.push_str(letter.trim_end());
    out.push_str("\n\n---\n\n");
    out.push_str(&signature_lines(sender).join("\n"));
    if let Some(url) = job_url.filter(|u| !u.trim().is_empty()) {
        out.push_str("\n\nJob reference: ");
        out.push_str(url);
    }
    out
}

pub fn html_body(letter: &str, sender: &Sender, job_url: Option<&str>) -> String {
    let paragraphs: String = letter
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| format!("<p>{}</p>\n", escape_html(l)))
        .collect();

    let signature = signature_lines(sender)
        .iter()
        .map(|l| escape_html(l))
        .collect::<Vec<_>>()
        .join("<br>\n");

    let reference = match job_url.filter(|u| !u.trim().is_empty()) {
        Some(url) => format!(
            "<p style=\"color: #666; font-size: 12px;\">Job reference: <a href=\"{0}\">{0}</a></p>\n",
            escape_html(url)
        ),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
{paragraphs}<hr>
<p>{signature}</p>
{reference}</body>
</html>"#
    )
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
