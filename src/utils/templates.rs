use crate::constants;
use crate::model::notification::NotificationType;

pub fn subject(title: &str) -> String {
    format!("{}{}", constants::EMAIL_SUBJECT_PREFIX, title)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

/// Full branded body used for single notifications.
pub fn notification_email(user_name: &str, kind: NotificationType, title: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body style="margin: 0; padding: 0; font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; background-color: #f3f4f6;">
  <table width="100%" cellpadding="0" cellspacing="0" style="background-color: #f3f4f6; padding: 20px;">
    <tr><td align="center">
      <table width="600" cellpadding="0" cellspacing="0" style="background-color: white; border-radius: 12px;">
        <tr><td style="background: #2563eb; padding: 30px; text-align: center; border-radius: 12px 12px 0 0;">
          <h1 style="color: white; margin: 0; font-size: 28px;">🎓 Campus Learn</h1>
        </td></tr>
        <tr><td style="padding: 40px 30px;">
          <p style="color: #6b7280; font-size: 16px; margin: 0 0 10px 0;">Hi {name},</p>
          <div style="background-color: #eff6ff; border-left: 4px solid #2563eb; padding: 20px; margin: 20px 0; border-radius: 6px;">
            <div style="font-size: 48px; text-align: center; margin-bottom: 10px;">{icon}</div>
            <h2 style="color: #1e293b; margin: 0 0 10px 0; font-size: 20px;">{title}</h2>
            <p style="color: #475569; margin: 0; font-size: 15px; line-height: 1.6;">{message}</p>
          </div>
          <div style="margin-top: 40px; padding-top: 20px; border-top: 1px solid #e5e7eb; color: #6b7280; font-size: 13px;">
            <p style="margin: 5px 0;">This is an automated notification from Campus Learn.</p>
            <p style="margin: 5px 0;">To manage your notification preferences, visit your profile settings.</p>
          </div>
        </td></tr>
      </table>
    </td></tr>
  </table>
</body>
</html>"#,
        name = escape(user_name),
        icon = kind.icon(),
        title = escape(title),
        message = escape(message),
    )
}

/// Short body used for bulk sends.
pub fn compact_email(user_name: &str, title: &str, message: &str) -> String {
    format!(
        "<html><body><h2>{}</h2><p>Hi {},</p><p>{}</p><hr><p><small>This is an automated notification from Campus Learn.</small></p></body></html>",
        escape(title),
        escape(user_name),
        escape(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bodies_escape_user_text() {
        let html = notification_email("Ada", NotificationType::Comment, "New comment", "<script>x</script>");
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("💬"));
        let html = compact_email("Bo & Co", "t", "m");
        assert!(html.contains("Bo &amp; Co"));
    }

    #[test]
    fn subject_is_prefixed() {
        assert_eq!(subject("Midterm"), "Campus Learn: Midterm");
    }
}
