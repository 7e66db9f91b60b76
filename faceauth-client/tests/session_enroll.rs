mod common;

use common::{jpeg_upload, missing_file, pdf_upload, session, validation, Call, FakeApi, FakeCamera};
use faceauth_client::error::{SubmitError, ValidationError};
use faceauth_client::notify::Severity;
use faceauth_client::session::{FormStatus, Tab};

#[tokio::test]
async fn submit_is_disabled_until_user_and_image_are_present() {
    let api = FakeApi::new();
    let session = session(&api, FakeCamera::default());
    let enroll = session.enroll();

    assert!(!enroll.can_submit());
    enroll.set_user_id("   ");
    enroll.acquire(jpeg_upload("face.jpg")).await.unwrap();
    assert!(!enroll.can_submit());

    enroll.set_user_id("alice");
    assert!(enroll.can_submit());
}

#[tokio::test]
async fn blank_user_id_never_reaches_the_service() {
    let api = FakeApi::new();
    let session = session(&api, FakeCamera::default());
    let enroll = session.enroll();

    enroll.set_user_id("  ");
    enroll.acquire(jpeg_upload("face.jpg")).await.unwrap();

    let err = enroll.submit().await.unwrap_err();
    assert!(matches!(err, SubmitError::Validation(ValidationError::EmptyField("User ID"))));
    assert!(api.calls().is_empty());

    let notice = session.notifier().current().unwrap();
    assert_eq!(notice.severity, Severity::Error);
}

#[tokio::test]
async fn successful_enroll_resets_form_and_refreshes_once() {
    let api = FakeApi::new();
    let session = session(&api, FakeCamera::default());
    let enroll = session.enroll();

    enroll.set_user_id("  alice ");
    enroll.acquire(jpeg_upload("face.jpg")).await.unwrap();
    enroll.submit().await.unwrap();

    assert_eq!(
        api.calls()[0],
        Call::Enroll { user_id: "alice".into(), file_name: "face.jpg".into(), size: 6 }
    );
    assert_eq!(api.list_calls(), 1);
    assert_eq!(api.count(|c| *c == Call::Health), 1);

    assert_eq!(enroll.user_id(), "");
    assert!(enroll.image().is_none());
    assert_eq!(enroll.status(), FormStatus::Idle);

    let users: Vec<String> = session.directory().users().into_iter().map(|u| u.user_id).collect();
    assert_eq!(users, vec!["alice".to_string()]);
    assert_eq!(session.directory().health().unwrap().enrolled_users, 1);

    let notice = session.notifier().current().unwrap();
    assert_eq!(notice.severity, Severity::Success);
    assert!(notice.message.contains("alice"));
}

#[tokio::test]
async fn failed_enroll_keeps_inputs_and_shows_server_detail() {
    let api = FakeApi::new();
    api.fail_enroll(validation("No face detected in image"));
    let session = session(&api, FakeCamera::default());
    let enroll = session.enroll();

    enroll.set_user_id("alice");
    enroll.acquire(jpeg_upload("face.jpg")).await.unwrap();
    let err = enroll.submit().await.unwrap_err();

    assert!(matches!(err, SubmitError::Api(_)));
    assert_eq!(enroll.user_id(), "alice");
    assert_eq!(enroll.image().unwrap().file_name, "face.jpg");
    assert!(enroll.can_submit());
    assert_eq!(api.list_calls(), 0);

    let notice = session.notifier().current().unwrap();
    assert_eq!(notice.severity, Severity::Error);
    assert_eq!(notice.message, "No face detected in image");
}

#[tokio::test]
async fn rejected_file_keeps_previous_image() {
    let api = FakeApi::new();
    let session = session(&api, FakeCamera::default());
    let enroll = session.enroll();

    enroll.acquire(jpeg_upload("first.jpg")).await.unwrap();
    let err = enroll.acquire(pdf_upload()).await.unwrap_err();

    assert!(matches!(err, ValidationError::NotAnImage { .. }));
    assert_eq!(enroll.image().unwrap().file_name, "first.jpg");
    assert_eq!(session.notifier().current().unwrap().severity, Severity::Error);
}

#[tokio::test]
async fn second_submit_while_in_flight_is_rejected() {
    let api = FakeApi::new();
    let session = session(&api, FakeCamera::default());
    let enroll = session.enroll();

    enroll.set_user_id("alice");
    enroll.acquire(jpeg_upload("face.jpg")).await.unwrap();

    let (first, second) = tokio::join!(enroll.submit(), async {
        assert_eq!(enroll.status(), FormStatus::Submitting);
        assert!(!enroll.can_submit());
        enroll.submit().await
    });

    assert!(first.is_ok());
    assert!(matches!(second, Err(SubmitError::AlreadyInFlight)));
    assert_eq!(api.count(|c| matches!(c, Call::Enroll { .. })), 1);
}

#[tokio::test]
async fn leaving_the_tab_discards_the_pending_image() {
    let api = FakeApi::new();
    let session = session(&api, FakeCamera::default());

    session.enroll().set_user_id("alice");
    session.enroll().acquire(jpeg_upload("face.jpg")).await.unwrap();
    session.switch_tab(Tab::Manage);

    assert!(session.enroll().image().is_none());
    assert_eq!(session.enroll().user_id(), "alice");
}

#[tokio::test]
async fn older_image_never_replaces_a_newer_one() {
    let api = FakeApi::new();
    let session = session(&api, FakeCamera::default());
    let enroll = session.enroll();

    let (older, newer) = tokio::join!(
        enroll.acquire(jpeg_upload("older.jpg")),
        enroll.acquire(jpeg_upload("newer.jpg"))
    );

    assert!(older.is_ok());
    assert!(newer.is_ok());
    assert_eq!(enroll.image().unwrap().file_name, "newer.jpg");
}

#[tokio::test]
async fn failure_of_a_superseded_image_stays_silent() {
    let api = FakeApi::new();
    let session = session(&api, FakeCamera::default());
    let enroll = session.enroll();

    let (stale, fresh) = tokio::join!(enroll.acquire(missing_file()), enroll.acquire(jpeg_upload("face.jpg")));

    assert!(stale.is_ok());
    assert!(fresh.is_ok());
    assert_eq!(enroll.image().unwrap().file_name, "face.jpg");
    assert!(session.notifier().current().is_none());
}

#[tokio::test]
async fn unreadable_file_is_reported_when_current() {
    let api = FakeApi::new();
    let session = session(&api, FakeCamera::default());

    let err = session.enroll().acquire(missing_file()).await.unwrap_err();
    assert!(matches!(err, ValidationError::Unreadable { .. }));
    assert_eq!(session.notifier().current().unwrap().severity, Severity::Error);
}
