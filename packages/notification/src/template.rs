//! Email rendering for report notifications.

use chrono::Datelike as _;

use crate::ReportNotification;

/// Subject and HTML body of a notification email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
}

/// Link to the report location on a map.
#[must_use]
pub fn map_url(lat: f64, lng: f64) -> String {
    format!("https://www.google.com/maps?q={lat},{lng}")
}

/// Link to the report on the public site.
#[must_use]
pub fn report_url(site_url: &str, report_id: &str) -> String {
    format!("{}/reports/{report_id}", site_url.trim_end_matches('/'))
}

/// Subject line for a notification about `neighborhood`.
#[must_use]
pub fn subject(neighborhood: &str) -> String {
    format!("🔔 Nuevo reporte en {neighborhood}")
}

/// Renders the notification email. User-supplied text is HTML-escaped.
#[must_use]
pub fn render(notification: &ReportNotification, site_url: &str) -> RenderedEmail {
    let site_url = site_url.trim_end_matches('/');
    let neighborhood = escape_html(&notification.neighborhood);
    let localidad = escape_html(&notification.localidad);
    let category = escape_html(&notification.category);
    let description = escape_html(&notification.description);
    let map = map_url(notification.lat, notification.lng);
    let report = report_url(site_url, &escape_html(&notification.report_id));
    let created = notification.created_at.format("%d/%m/%Y %H:%M UTC");
    let year = notification.created_at.year();
    let lat = notification.lat;
    let lng = notification.lng;

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Alerta de Seguridad - {neighborhood}</title>
</head>
<body style="font-family: 'Segoe UI', Tahoma, sans-serif; line-height: 1.6; color: #1e3a8a; max-width: 650px; margin: 0 auto; background-color: #e0e7ff;">
  <div style="background-color: #ffffff; border: 2px solid #1e40af; border-radius: 4px; margin: 20px; overflow: hidden;">
    <div style="background-color: #1e3a8a; padding: 25px 30px;">
      <h1 style="color: #ffffff; margin: 0; font-size: 22px; text-transform: uppercase;">Radar Ciudadano</h1>
      <p style="color: #bfdbfe; margin: 5px 0 0 0; font-size: 13px;">Nuevo reporte</p>
    </div>
    <div style="padding: 30px;">
      <p style="margin: 0 0 20px 0; font-weight: 600; font-size: 16px;">{neighborhood}, {localidad}</p>
      <p><strong>Categoría:</strong> {category}</p>
      <p><strong>Descripción:</strong></p>
      <div style="border-left: 4px solid #1e40af; padding: 15px; background-color: #f8fafc;">{description}</div>
      <p><strong>Ubicación:</strong> <a href="{map}">Ver en mapa</a> ({lat:.6}, {lng:.6})</p>
      <p><strong>Fecha y hora:</strong> {created}</p>
      <p style="text-align: center; margin: 30px 0;">
        <a href="{report}" style="background-color: #1e40af; color: #ffffff; padding: 16px 40px; text-decoration: none; border-radius: 3px; font-weight: 700;">Ver reporte completo</a>
      </p>
    </div>
    <div style="background-color: #f1f5f9; padding: 25px 30px; font-size: 12px; color: #475569; text-align: center;">
      <p>Recibe esta notificación porque está suscrito a las alertas de <strong>{neighborhood}</strong>.</p>
      <p><a href="{site_url}/settings/notifications" style="color: #1e40af;">Administrar suscripciones</a></p>
      <p style="color: #94a3b8;">© {year} Radar Ciudadano</p>
    </div>
  </div>
</body>
</html>
"#
    );

    RenderedEmail {
        subject: subject(&notification.neighborhood),
        html,
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};

    use super::*;

    fn notification() -> ReportNotification {
        ReportNotification {
            report_id: "r-42".to_string(),
            neighborhood: "San Martín".to_string(),
            localidad: "Formosa".to_string(),
            description: "Robo <script>alert(1)</script> & fuga".to_string(),
            category: "Robo".to_string(),
            lat: -26.1845,
            lng: -58.1765,
            created_at: Utc.with_ymd_and_hms(2025, 3, 14, 21, 5, 0).unwrap(),
        }
    }

    #[test]
    fn subject_names_neighborhood() {
        let email = render(&notification(), "https://radar.example");
        assert_eq!(email.subject, "🔔 Nuevo reporte en San Martín");
    }

    #[test]
    fn body_links_map_and_report() {
        let email = render(&notification(), "https://radar.example/");
        assert!(
            email
                .html
                .contains("https://www.google.com/maps?q=-26.1845,-58.1765")
        );
        assert!(email.html.contains("https://radar.example/reports/r-42"));
        assert!(email.html.contains("14/03/2025 21:05 UTC"));
        assert!(email.html.contains("(-26.184500, -58.176500)"));
    }

    #[test]
    fn body_escapes_user_text() {
        let email = render(&notification(), "https://radar.example");
        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("&lt;script&gt;alert(1)&lt;/script&gt; &amp; fuga"));
    }
}
