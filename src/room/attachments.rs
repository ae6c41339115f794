//! Picking, preparing and sending file, picture and video attachments.

use std::future::Future;

use tracing::{debug, warn};

use super::room_handle::{Attachments, Blob, RoomHandle};
use crate::{
    config::RoomViewConfig,
    errors::AttachmentError,
    image_utils::{self, LoadedImage},
    power_levels::ROOM_MESSAGE_TYPE,
    timeline::content::{MediaContent, MediaInfo, MessageContent},
};

/// MIME type fragments of the document types that may be sent as files.
const DOCUMENT_MIME_FRAGMENTS: [&str; 7] =
    ["xml", "text/plain", "word", "pdf", "powerpoint", "officedocument", "excel"];

const UNSUPPORTED_VIDEO_MIME_TYPE: &str = "video/avi";

/// A file the user picked or pasted.
#[derive(Debug, Clone)]
pub struct PickedFile {
    pub name: String,
    pub blob: Blob,
}

impl PickedFile {
    /// Fills in the MIME type from the file name when the platform didn't report one.
    pub fn with_guessed_mime_type(mut self) -> Self {
        if self.blob.mime_type.is_empty() {
            self.blob.mime_type = mime_guess::from_path(&self.name).first_or_octet_stream().to_string();
        }
        self
    }
}

/// A video loaded by the platform, with its intrinsic size and duration.
#[derive(Debug, Clone)]
pub struct LoadedVideo {
    pub blob: Blob,
    pub width: u32,
    pub height: u32,
    /// In milliseconds.
    pub duration: Option<u64>,
}

impl LoadedVideo {
    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height)
    }

    pub fn info(&self) -> MediaInfo {
        MediaInfo {
            mimetype: Some(self.blob.mime_type.clone()),
            size: Some(self.blob.size()),
            w: Some(self.width),
            h: Some(self.height),
            duration: self.duration,
            thumbnail_info: None,
        }
    }
}

/// Host services needed to pick and decode attachments.
pub trait Platform: Send + Sync {
    /// Whether the app may read back pixel data, which scaling images requires.
    fn has_read_pixel_permission(&self) -> bool;

    /// Lets the user pick a file, optionally restricted to an `accept` filter
    /// such as `"image/*"`. Resolves to `None` if the user cancelled.
    fn open_file(&self, accept: Option<&str>) -> impl Future<Output = Option<PickedFile>> + Send;

    fn load_video(&self, blob: Blob) -> impl Future<Output = Result<LoadedVideo, AttachmentError>> + Send;

    /// Renders a frame of `video` as an image no larger than `max_dimension` on either side.
    fn video_thumbnail(
        &self,
        video: &LoadedVideo,
        max_dimension: u32,
    ) -> impl Future<Output = Result<LoadedImage, AttachmentError>> + Send;
}

/// Optional callbacks for attachments that were rejected before sending.
#[derive(Default)]
pub struct AttachmentHooks {
    pub on_oversized: Option<Box<dyn FnMut() + Send>>,
    pub on_unsupported_type: Option<Box<dyn FnMut() + Send>>,
}

impl AttachmentHooks {
    fn oversized(&mut self) -> AttachmentOutcome {
        if let Some(hook) = self.on_oversized.as_mut() {
            hook();
        }
        AttachmentOutcome::Oversized
    }

    fn unsupported_type(&mut self) -> AttachmentOutcome {
        if let Some(hook) = self.on_unsupported_type.as_mut() {
            hook();
        }
        AttachmentOutcome::UnsupportedType
    }
}

impl std::fmt::Debug for AttachmentHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentHooks")
            .field("on_oversized", &self.on_oversized.is_some())
            .field("on_unsupported_type", &self.on_unsupported_type.is_some())
            .finish()
    }
}

/// What happened to an attachment the user tried to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentOutcome {
    Sent,
    /// The user closed the file picker without choosing anything.
    NoFileChosen,
    /// Scaling images requires pixel access, which the platform denied.
    PermissionDenied,
    Oversized,
    UnsupportedType,
    /// Preparing or sending the attachment failed.
    Failed,
}

fn is_document(mime_type: &str) -> bool {
    DOCUMENT_MIME_FRAGMENTS.iter().any(|fragment| mime_type.contains(fragment))
}

/// The name an upload is stored under. The message body keeps the name as picked.
fn upload_filename(name: &str) -> String {
    let sanitized = sanitize_filename::sanitize(name);
    if sanitized.is_empty() { "attachment".to_owned() } else { sanitized }
}

/// Sends `file` as a plain `m.file` message.
pub async fn send_file<R: RoomHandle>(room: &R, file: PickedFile) -> Result<AttachmentOutcome, AttachmentError> {
    let PickedFile { name, blob } = file;
    let content = MessageContent::File(MediaContent {
        body: name.clone(),
        url: None,
        info: Some(MediaInfo {
            mimetype: Some(blob.mime_type.clone()),
            size: Some(blob.size()),
            ..Default::default()
        }),
    });
    let attachments = Attachments::from([("url", room.create_attachment(blob, &upload_filename(&name)))]);
    room.send_event(ROOM_MESSAGE_TYPE, serde_json::to_value(&content)?, Some(attachments)).await?;
    Ok(AttachmentOutcome::Sent)
}

pub async fn pick_and_send_file<R: RoomHandle, P: Platform>(
    room: &R,
    platform: &P,
    config: &RoomViewConfig,
    hooks: &mut AttachmentHooks,
) -> Result<AttachmentOutcome, AttachmentError> {
    let Some(file) = platform.open_file(None).await else {
        return Ok(AttachmentOutcome::NoFileChosen);
    };
    let file = file.with_guessed_mime_type();
    debug!(name = %file.name, mime_type = %file.blob.mime_type, size = file.blob.size(), "Picked file");
    if file.blob.size() > config.attachment_max_bytes {
        return Ok(hooks.oversized());
    }
    if !is_document(&file.blob.mime_type) {
        return Ok(hooks.unsupported_type());
    }
    send_file(room, file).await
}

/// Decodes `file` as an image, compresses it if needed, and sends it with a thumbnail for large images.
async fn send_image<R: RoomHandle>(
    room: &R,
    config: &RoomViewConfig,
    file: PickedFile,
) -> Result<AttachmentOutcome, AttachmentError> {
    let PickedFile { name, blob } = file;
    let mut image = LoadedImage::load(blob)?;
    let limit = config.image_compress_threshold_bytes;
    if image.file_size() > limit {
        let ratio = image_utils::compress_ratio(image.file_size(), limit);
        debug!(size = image.file_size(), ratio, "Compressing image before upload");
        image = image.scale_by(ratio)?;
    }
    let thumbnail = if image.max_dimension() > config.image_thumbnail_threshold {
        Some(image.scale(config.image_thumbnail_dimension)?)
    } else {
        None
    };
    let mut info = image.info();
    let mut attachments = Attachments::from([("url", room.create_attachment(image.blob, &upload_filename(&name)))]);
    if let Some(thumbnail) = thumbnail {
        info.thumbnail_info = Some(Box::new(thumbnail.info()));
        attachments.insert("info.thumbnail_url", room.create_attachment(thumbnail.blob, &upload_filename(&name)));
    }

    let content = MessageContent::Image(MediaContent { body: name, url: None, info: Some(info) });
    room.send_event(ROOM_MESSAGE_TYPE, serde_json::to_value(&content)?, Some(attachments)).await?;
    Ok(AttachmentOutcome::Sent)
}

async fn send_video<R: RoomHandle, P: Platform>(
    room: &R,
    platform: &P,
    name: String,
    video: LoadedVideo,
    thumbnail_dimension: u32,
) -> Result<AttachmentOutcome, AttachmentError> {
    let thumbnail = platform.video_thumbnail(&video, thumbnail_dimension).await?;
    let mut info = video.info();
    info.thumbnail_info = Some(Box::new(thumbnail.info()));
    let attachments = Attachments::from([
        ("url", room.create_attachment(video.blob, &upload_filename(&name))),
        ("info.thumbnail_url", room.create_attachment(thumbnail.blob, &upload_filename(&name))),
    ]);
    let content = MessageContent::Video(MediaContent { body: name, url: None, info: Some(info) });
    room.send_event(ROOM_MESSAGE_TYPE, serde_json::to_value(&content)?, Some(attachments)).await?;
    Ok(AttachmentOutcome::Sent)
}

/// Lets the user pick an image or a video. Anything else is sent as a plain file.
pub async fn pick_and_send_picture<R: RoomHandle, P: Platform>(
    room: &R,
    platform: &P,
    config: &RoomViewConfig,
    hooks: &mut AttachmentHooks,
) -> Result<AttachmentOutcome, AttachmentError> {
    if !platform.has_read_pixel_permission() {
        warn!("Cannot send picture: no permission to read image data for scaling");
        return Ok(AttachmentOutcome::PermissionDenied);
    }
    let Some(file) = platform.open_file(Some("image/*, video/*")).await else {
        return Ok(AttachmentOutcome::NoFileChosen);
    };
    let file = file.with_guessed_mime_type();
    let mime_type = file.blob.mime_type.clone();
    if image_utils::is_image(&mime_type) {
        return send_image(room, config, file).await;
    }
    if !image_utils::is_video(&mime_type) {
        return send_file(room, file).await;
    }
    if mime_type.eq_ignore_ascii_case(UNSUPPORTED_VIDEO_MIME_TYPE) {
        return Ok(hooks.unsupported_type());
    }
    let PickedFile { name, blob } = file;
    let video = match platform.load_video(blob).await {
        Err(AttachmentError::UnsupportedVideo(mime_type)) => {
            warn!(%mime_type, "Platform cannot load video");
            return Ok(hooks.unsupported_type());
        }
        result => result?,
    };
    if video.blob.size() > config.attachment_max_bytes {
        return Ok(hooks.oversized());
    }
    send_video(room, platform, name, video, config.video_thumbnail_dimension).await
}

/// Lets the user pick a video. Anything else is sent as a plain file.
pub async fn pick_and_send_video<R: RoomHandle, P: Platform>(
    room: &R,
    platform: &P,
    config: &RoomViewConfig,
) -> Result<AttachmentOutcome, AttachmentError> {
    if !platform.has_read_pixel_permission() {
        warn!("Cannot send video: no permission to read image data for scaling");
        return Ok(AttachmentOutcome::PermissionDenied);
    }
    let Some(file) = platform.open_file(Some("video/*")).await else {
        return Ok(AttachmentOutcome::NoFileChosen);
    };
    let file = file.with_guessed_mime_type();
    if !image_utils::is_video(&file.blob.mime_type) {
        return send_file(room, file).await;
    }
    let PickedFile { name, blob } = file;
    let video = match platform.load_video(blob).await {
        Err(AttachmentError::UnsupportedVideo(mime_type)) => {
            warn!(%mime_type, "Platform cannot load video");
            return Ok(AttachmentOutcome::UnsupportedType);
        }
        result => result?,
    };
    let max_dimension = config.sent_image_size_limit
        .unwrap_or_else(|| video.max_dimension().min(config.video_thumbnail_dimension));
    send_video(room, platform, name, video, max_dimension).await
}

/// Sends an image pasted into the composer. Non-image data is sent as a plain file.
pub async fn send_pasted_picture<R: RoomHandle, P: Platform>(
    room: &R,
    platform: &P,
    config: &RoomViewConfig,
    file: PickedFile,
) -> Result<AttachmentOutcome, AttachmentError> {
    if !platform.has_read_pixel_permission() {
        warn!("Cannot send pasted picture: no permission to read image data for scaling");
        return Ok(AttachmentOutcome::PermissionDenied);
    }
    let file = file.with_guessed_mime_type();
    if !image_utils::is_image(&file.blob.mime_type) {
        return send_file(room, file).await;
    }
    send_image(room, config, file).await
}


#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{
        image_utils::test_images::{gif, png},
        room::test_support::{MockPlatform, MockRoom, Sent, UNPLAYABLE_VIDEO_MIME_TYPE},
    };

    fn picked(name: &str, blob: Blob) -> PickedFile {
        PickedFile { name: name.to_owned(), blob }
    }

    fn sent_content(room: &MockRoom) -> (serde_json::Value, Vec<&'static str>) {
        match room.sent().pop() {
            Some(Sent::Event { content, attachments, .. }) => (content, attachments),
            other => panic!("expected a sent event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn file_rules() {
        let room = MockRoom::new();
        let config = RoomViewConfig::default();
        let oversized_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&oversized_calls);
        let mut hooks = AttachmentHooks {
            on_oversized: Some(Box::new(move || { calls.fetch_add(1, Ordering::SeqCst); })),
            on_unsupported_type: None,
        };

        let platform = MockPlatform::picking(None);
        assert_eq!(pick_and_send_file(&room, &platform, &config, &mut hooks).await.unwrap(), AttachmentOutcome::NoFileChosen);

        let platform = MockPlatform::picking(Some(picked("big.pdf", Blob::new(vec![0; 51 * 1024 * 1024], "application/pdf"))));
        assert_eq!(pick_and_send_file(&room, &platform, &config, &mut hooks).await.unwrap(), AttachmentOutcome::Oversized);
        assert_eq!(oversized_calls.load(Ordering::SeqCst), 1);

        let platform = MockPlatform::picking(Some(picked("app.exe", Blob::new(vec![0; 10], "application/x-msdownload"))));
        assert_eq!(pick_and_send_file(&room, &platform, &config, &mut hooks).await.unwrap(), AttachmentOutcome::UnsupportedType);
        assert!(room.sent().is_empty());

        let platform = MockPlatform::picking(Some(picked("notes.txt", Blob::new(b"hi".to_vec(), "text/plain"))));
        assert_eq!(pick_and_send_file(&room, &platform, &config, &mut hooks).await.unwrap(), AttachmentOutcome::Sent);
        let (content, attachments) = sent_content(&room);
        assert_eq!(content["msgtype"], "m.file");
        assert_eq!(content["body"], "notes.txt");
        assert_eq!(attachments, ["url"]);
    }

    #[tokio::test]
    async fn large_pictures_get_a_thumbnail() {
        let room = MockRoom::new();
        let config = RoomViewConfig::default();
        let platform = MockPlatform::picking(Some(picked("wide.png", png(1200, 300))));
        let outcome = pick_and_send_picture(&room, &platform, &config, &mut AttachmentHooks::default()).await.unwrap();
        assert_eq!(outcome, AttachmentOutcome::Sent);

        let (content, attachments) = sent_content(&room);
        assert_eq!(content["msgtype"], "m.image");
        assert_eq!(content["info"]["w"], 1200);
        assert_eq!(content["info"]["thumbnail_info"]["w"], 400);
        assert_eq!(attachments, ["url", "info.thumbnail_url"]);
    }

    #[tokio::test]
    async fn small_pictures_have_no_thumbnail() {
        let room = MockRoom::new();
        let config = RoomViewConfig::default();
        let platform = MockPlatform::picking(None);
        let outcome = send_pasted_picture(&room, &platform, &config, picked("small.png", png(20, 20))).await.unwrap();
        assert_eq!(outcome, AttachmentOutcome::Sent);
        let (content, attachments) = sent_content(&room);
        assert!(content["info"].get("thumbnail_info").is_none());
        assert_eq!(attachments, ["url"]);
    }

    #[tokio::test]
    async fn avi_videos_are_unsupported_and_other_files_fall_back() {
        let room = MockRoom::new();
        let config = RoomViewConfig::default();
        let mut hooks = AttachmentHooks::default();

        let platform = MockPlatform::picking(Some(picked("clip.avi", Blob::new(vec![0; 10], "video/avi"))));
        assert_eq!(pick_and_send_picture(&room, &platform, &config, &mut hooks).await.unwrap(), AttachmentOutcome::UnsupportedType);

        let platform = MockPlatform::picking(Some(picked("doc.pdf", Blob::new(vec![0; 10], "application/pdf"))));
        assert_eq!(pick_and_send_picture(&room, &platform, &config, &mut hooks).await.unwrap(), AttachmentOutcome::Sent);
        assert_eq!(sent_content(&room).0["msgtype"], "m.file");
    }

    #[tokio::test]
    async fn gif_pictures_are_sent() {
        let room = MockRoom::new();
        let config = RoomViewConfig::default();
        let platform = MockPlatform::picking(Some(picked("cat.gif", gif(1, 1))));
        let outcome = pick_and_send_picture(&room, &platform, &config, &mut AttachmentHooks::default()).await.unwrap();
        assert_eq!(outcome, AttachmentOutcome::Sent);
        let (content, attachments) = sent_content(&room);
        assert_eq!(content["msgtype"], "m.image");
        assert_eq!(content["body"], "cat.gif");
        assert_eq!(content["info"]["mimetype"], "image/gif");
        assert_eq!(attachments, ["url"]);

        let platform = MockPlatform::picking(Some(picked("wide.gif", gif(1200, 300))));
        pick_and_send_picture(&room, &platform, &config, &mut AttachmentHooks::default()).await.unwrap();
        let (content, _) = sent_content(&room);
        assert_eq!(content["info"]["thumbnail_info"]["mimetype"], "image/png");
    }

    #[tokio::test]
    async fn videos_the_platform_cannot_load_are_unsupported() {
        let room = MockRoom::new();
        let config = RoomViewConfig::default();
        let unsupported_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&unsupported_calls);
        let mut hooks = AttachmentHooks {
            on_oversized: None,
            on_unsupported_type: Some(Box::new(move || { calls.fetch_add(1, Ordering::SeqCst); })),
        };

        let clip = || Some(picked("clip.webm", Blob::new(vec![0; 10], UNPLAYABLE_VIDEO_MIME_TYPE)));
        let platform = MockPlatform::picking(clip());
        assert_eq!(pick_and_send_picture(&room, &platform, &config, &mut hooks).await.unwrap(), AttachmentOutcome::UnsupportedType);
        assert_eq!(unsupported_calls.load(Ordering::SeqCst), 1);

        let platform = MockPlatform::picking(clip());
        assert_eq!(pick_and_send_video(&room, &platform, &config).await.unwrap(), AttachmentOutcome::UnsupportedType);
        assert!(room.sent().is_empty());
        assert!(platform.thumbnail_requests().is_empty());
    }

    #[tokio::test]
    async fn videos_are_sent_with_thumbnail() {
        let room = MockRoom::new();
        let config = RoomViewConfig::default();
        let platform = MockPlatform::picking(Some(picked("clip.mp4", Blob::new(vec![0; 10], "video/mp4"))));
        assert_eq!(pick_and_send_video(&room, &platform, &config).await.unwrap(), AttachmentOutcome::Sent);
        let (content, attachments) = sent_content(&room);
        assert_eq!(content["msgtype"], "m.video");
        assert_eq!(content["info"]["duration"], 1500);
        assert_eq!(attachments, ["url", "info.thumbnail_url"]);
        // The mock video is 640px wide, below the 800px cap.
        assert_eq!(platform.thumbnail_requests(), [640]);
    }

    #[tokio::test]
    async fn denied_pixel_permission_sends_nothing() {
        let room = MockRoom::new();
        let platform = MockPlatform::picking(Some(picked("a.png", png(10, 10)))).without_pixel_permission();
        let outcome = pick_and_send_picture(&room, &platform, &RoomViewConfig::default(), &mut AttachmentHooks::default())
            .await
            .unwrap();
        assert_eq!(outcome, AttachmentOutcome::PermissionDenied);
        assert!(room.sent().is_empty());
    }

    #[test]
    fn missing_mime_type_is_guessed_from_name() {
        let file = picked("photo.png", Blob::new(vec![0; 4], "")).with_guessed_mime_type();
        assert_eq!(file.blob.mime_type, "image/png");
        let file = picked("data.unknownext", Blob::new(vec![0; 4], "")).with_guessed_mime_type();
        assert_eq!(file.blob.mime_type, "application/octet-stream");
        let file = picked("notes.txt", Blob::new(vec![0; 4], "application/pdf")).with_guessed_mime_type();
        assert_eq!(file.blob.mime_type, "application/pdf");
    }

    #[test]
    fn upload_filenames_are_sanitized() {
        assert_eq!(upload_filename("../secret/report.pdf"), "..secretreport.pdf");
        assert_eq!(upload_filename("holiday.png"), "holiday.png");
        assert_eq!(upload_filename("/"), "attachment");
    }
}
