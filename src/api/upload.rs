//! Multipart form parsing.
//!
//! Each endpoint's form is read once into an explicit struct. File parts are
//! written to the upload directory chunk by chunk as [`TempUpload`]s;
//! everything else is kept as text.

use std::collections::HashMap;
use std::path::Path;

use axum::extract::Multipart;
use axum::http::StatusCode;

use crate::media::{MediaError, TempUpload};

/// Raw fields of a multipart body.
#[derive(Default)]
struct FormFields {
    text: HashMap<String, String>,
    files: HashMap<String, TempUpload>,
}

impl FormFields {
    fn text(&mut self, name: &str) -> Option<String> {
        self.text.remove(name)
    }

    fn file(&mut self, name: &str) -> Option<TempUpload> {
        self.files.remove(name)
    }
}

async fn read_fields(
    mut multipart: Multipart,
    upload_dir: &Path,
    file_fields: &[&str],
    max_bytes: usize,
) -> Result<FormFields, MediaError> {
    let mut fields = FormFields::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if file_fields.contains(&name.as_str()) {
            let file_name = field.file_name().map(str::to_string);
            let mut writer = TempUpload::create(upload_dir, file_name.as_deref(), max_bytes).await?;
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| multipart_error(e, max_bytes))?
            {
                writer.write_chunk(&chunk).await?;
            }
            if let Some(upload) = writer.finish().await? {
                fields.files.insert(name, upload);
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| multipart_error(e, max_bytes))?;
            fields.text.insert(name, value);
        }
    }

    Ok(fields)
}

fn multipart_error(e: axum::extract::multipart::MultipartError, max_bytes: usize) -> MediaError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        MediaError::TooLarge(max_bytes)
    } else {
        MediaError::Multipart(format!("Invalid multipart data: {}", e.body_text()))
    }
}

/// Where and how large uploads may be.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits<'a> {
    pub dir: &'a Path,
    pub max_bytes: usize,
}

pub struct RegisterForm {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<TempUpload>,
    pub cover_image: Option<TempUpload>,
}

impl RegisterForm {
    pub async fn read(multipart: Multipart, limits: UploadLimits<'_>) -> Result<Self, MediaError> {
        let mut f = read_fields(
            multipart,
            limits.dir,
            &["avatar", "coverImage"],
            limits.max_bytes,
        )
        .await?;
        Ok(Self {
            full_name: f.text("fullName"),
            email: f.text("email"),
            username: f.text("username"),
            password: f.text("password"),
            avatar: f.file("avatar"),
            cover_image: f.file("coverImage"),
        })
    }
}

pub struct PublishVideoForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_file: Option<TempUpload>,
    pub thumbnail: Option<TempUpload>,
}

impl PublishVideoForm {
    pub async fn read(multipart: Multipart, limits: UploadLimits<'_>) -> Result<Self, MediaError> {
        let mut f = read_fields(
            multipart,
            limits.dir,
            &["videoFile", "thumbnail"],
            limits.max_bytes,
        )
        .await?;
        Ok(Self {
            title: f.text("title"),
            description: f.text("description"),
            video_file: f.file("videoFile"),
            thumbnail: f.file("thumbnail"),
        })
    }
}

pub struct UpdateVideoForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<TempUpload>,
}

impl UpdateVideoForm {
    pub async fn read(multipart: Multipart, limits: UploadLimits<'_>) -> Result<Self, MediaError> {
        let mut f = read_fields(multipart, limits.dir, &["thumbnail"], limits.max_bytes).await?;
        Ok(Self {
            title: f.text("title"),
            description: f.text("description"),
            thumbnail: f.file("thumbnail"),
        })
    }
}

/// A form carrying a single image under the given field name.
pub struct ImageForm {
    pub image: Option<TempUpload>,
}

impl ImageForm {
    pub async fn read(
        multipart: Multipart,
        limits: UploadLimits<'_>,
        field: &str,
    ) -> Result<Self, MediaError> {
        let mut f = read_fields(multipart, limits.dir, &[field], limits.max_bytes).await?;
        Ok(Self {
            image: f.file(field),
        })
    }
}
