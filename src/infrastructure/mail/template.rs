use crate::entities::contact::Submission;

/// `[<site>] <label> — <name>`
pub fn subject_line(site_name: &str, submission: &Submission) -> String {
    format!(
        "[{}] {} — {}",
        site_name,
        submission.subject.label(),
        submission.name
    )
}

/// Escapes the HTML metacharacters and nothing else.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escaped text with the sender's line breaks kept as `<br>`.
fn escape_multiline(text: &str) -> String {
    text.lines()
        .map(escape_html)
        .collect::<Vec<_>>()
        .join("<br>\n")
}

/// Renders the notification body. Every user-supplied value is escaped.
pub fn render_contact_email(site_name: &str, submission: &Submission) -> String {
    let site = escape_html(site_name);
    let name = escape_html(&submission.name);
    let email = escape_html(&submission.email);
    let phone = escape_html(&submission.phone);
    let label = escape_html(submission.subject.label());
    let message = escape_multiline(&submission.message);

    format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head><meta charset="UTF-8"></head>
<body style="font-family: 'Montserrat', Arial, sans-serif; color: #1A1A2E; max-width: 600px; margin: 0 auto; padding: 20px;">
  <div style="background: linear-gradient(135deg, #5D328E 0%, #3E1F6B 100%); padding: 28px 32px; border-radius: 16px 16px 0 0;">
    <h1 style="margin: 0; color: #E2C275; font-size: 1.4rem;">{site}</h1>
    <p style="margin: 6px 0 0; color: rgba(255,255,255,0.7); font-size: 0.9rem;">Nova mensagem do formulário de contato</p>
  </div>
  <div style="background: #F8F6F1; padding: 32px; border: 1px solid #E0DED8; border-top: none;">
    <table style="width: 100%; border-collapse: collapse;">
      <tr>
        <td style="padding: 12px 0; border-bottom: 1px solid #E0DED8; font-weight: 600; width: 120px; vertical-align: top;">Nome</td>
        <td style="padding: 12px 0; border-bottom: 1px solid #E0DED8;">{name}</td>
      </tr>
      <tr>
        <td style="padding: 12px 0; border-bottom: 1px solid #E0DED8; font-weight: 600; vertical-align: top;">E-mail</td>
        <td style="padding: 12px 0; border-bottom: 1px solid #E0DED8;"><a href="mailto:{email}" style="color: #5D328E;">{email}</a></td>
      </tr>
      <tr>
        <td style="padding: 12px 0; border-bottom: 1px solid #E0DED8; font-weight: 600; vertical-align: top;">Telefone</td>
        <td style="padding: 12px 0; border-bottom: 1px solid #E0DED8;">{phone}</td>
      </tr>
      <tr>
        <td style="padding: 12px 0; border-bottom: 1px solid #E0DED8; font-weight: 600; vertical-align: top;">Assunto</td>
        <td style="padding: 12px 0; border-bottom: 1px solid #E0DED8;">{label}</td>
      </tr>
      <tr>
        <td style="padding: 12px 0; font-weight: 600; vertical-align: top;">Mensagem</td>
        <td style="padding: 12px 0; line-height: 1.65;">{message}</td>
      </tr>
    </table>
  </div>
  <div style="background: #1A1A2E; padding: 18px 32px; border-radius: 0 0 16px 16px; text-align: center;">
    <p style="margin: 0; color: rgba(255,255,255,0.4); font-size: 0.78rem;">Enviado pelo formulário de contato — {site}</p>
  </div>
</body>
</html>
"#
    )
}
