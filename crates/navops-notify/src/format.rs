//! Per-channel payload construction.

use serde_json::{Value, json};

use navops_core::notify::AlertLevel;

/// Slack attachment color per level.
fn slack_color(level: AlertLevel) -> &'static str {
    match level {
        AlertLevel::Info => "good",
        AlertLevel::Warning => "warning",
        AlertLevel::Error | AlertLevel::Critical => "danger",
    }
}

pub fn webhook_payload(
    kind: &str,
    subject: &str,
    message: &str,
    timestamp: u64,
    data: Option<&Value>,
) -> Value {
    let mut payload = json!({
        "type": kind,
        "subject": subject,
        "message": message,
        "timestamp": timestamp,
    });
    if let (Some(obj), Some(data)) = (payload.as_object_mut(), data) {
        obj.insert("data".to_string(), data.clone());
    }
    payload
}

pub fn slack_payload(level: AlertLevel, subject: &str, message: &str, timestamp: u64) -> Value {
    json!({
        "attachments": [{
            "color": slack_color(level),
            "title": subject,
            "text": message,
            "ts": timestamp,
        }]
    })
}

pub fn dingtalk_payload(subject: &str, message: &str) -> Value {
    json!({
        "msgtype": "markdown",
        "markdown": {
            "title": subject,
            "text": format!("## {subject}\n\n{message}"),
        }
    })
}

pub fn wechat_payload(subject: &str, message: &str) -> Value {
    json!({
        "msgtype": "markdown",
        "markdown": {
            "content": format!("## {subject}\n\n{message}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_payload_includes_optional_data() {
        let data = json!({"replicas": 5});
        let payload = webhook_payload("alert", "subj", "msg", 42, Some(&data));
        assert_eq!(payload["type"], "alert");
        assert_eq!(payload["timestamp"], 42);
        assert_eq!(payload["data"]["replicas"], 5);

        let bare = webhook_payload("alert", "subj", "msg", 42, None);
        assert!(bare.get("data").is_none());
    }

    #[test]
    fn slack_color_tracks_level() {
        let payload = slack_payload(AlertLevel::Critical, "s", "m", 1);
        assert_eq!(payload["attachments"][0]["color"], "danger");
        let payload = slack_payload(AlertLevel::Info, "s", "m", 1);
        assert_eq!(payload["attachments"][0]["color"], "good");
    }

    #[test]
    fn markdown_payloads_embed_subject() {
        let d = dingtalk_payload("Disk Alert", "disk at 95%");
        assert_eq!(d["msgtype"], "markdown");
        assert!(d["markdown"]["text"].as_str().unwrap().contains("Disk Alert"));

        let w = wechat_payload("Disk Alert", "disk at 95%");
        assert!(w["markdown"]["content"].as_str().unwrap().contains("disk at 95%"));
    }
}
