use chrono::Local;
use faceauth_client::camera::{CameraInfo, CameraKind};
use faceauth_client::{EnrolledUserSummary, Notification, Notifier, PanelStyle, ResultPanel, Severity, SystemHealth};

/// Prints every notification as it is raised. Errors go to stderr.
pub fn attach(notifier: &Notifier) {
    notifier.set_listener(|notification: &Notification| match notification.severity {
        Severity::Error => eprintln!("✗ {}", notification.message),
        Severity::Success => println!("✓ {}", notification.message),
        Severity::Info => println!("• {}", notification.message),
    });
}

pub fn health(health: &SystemHealth) {
    println!("Status:         {}", health.status);
    println!("Enrolled users: {}", health.enrolled_users);
    if let Some(timestamp) = health.timestamp {
        println!("Checked at:     {}", timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"));
    }
}

pub fn users(users: &[EnrolledUserSummary]) {
    if users.is_empty() {
        println!("No enrolled users");
        return;
    }
    println!("{} enrolled user(s):", users.len());
    for user in users {
        println!("  {}", user.user_id);
    }
}

pub fn panel(panel: &ResultPanel) {
    let mark = match panel.style {
        PanelStyle::Success => "✓",
        PanelStyle::Error => "✗",
    };
    println!();
    println!("{} {}", mark, panel.headline);
    println!("  User:       {}", panel.user);
    println!("  Event:      {}", panel.event);
    println!("  Confidence: {}", panel.confidence_text);
    if !panel.message.is_empty() {
        println!("  Message:    {}", panel.message);
    }
}

pub fn cameras(cameras: &[CameraInfo]) {
    if cameras.is_empty() {
        println!("No cameras found");
        println!("Check that a camera is connected and that you can read /dev/video*");
        return;
    }
    for camera in cameras {
        let kind = match camera.kind {
            CameraKind::Infrared => "IR",
            CameraKind::Rgb => "RGB",
            CameraKind::Unknown => "unknown",
        };
        println!("{}  {} ({})", camera.device_path, camera.name, kind);
    }
}
