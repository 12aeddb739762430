//! `TEXT` column round-trips for the enums in [`krai_core::types`] that
//! don't carry their own `as_str`/`parse` (unlike `DocumentType`/`Stage`,
//! which do and are used directly).

use krai_core::error::{Error, Result};
use krai_core::types::{
    ImageType, OwnerKind, PipelineErrorStatus, ProcessingStatus, QueueItemStatus, StageState,
    ValidationStatus,
};

pub fn processing_status_str(s: ProcessingStatus) -> &'static str {
    match s {
        ProcessingStatus::Pending => "pending",
        ProcessingStatus::Processing => "processing",
        ProcessingStatus::Completed => "completed",
        ProcessingStatus::Failed => "failed",
    }
}

pub fn parse_processing_status(s: &str) -> Result<ProcessingStatus> {
    Ok(match s {
        "pending" => ProcessingStatus::Pending,
        "processing" => ProcessingStatus::Processing,
        "completed" => ProcessingStatus::Completed,
        "failed" => ProcessingStatus::Failed,
        other => return Err(Error::Storage(format!("unknown processing_status {other:?}"))),
    })
}

pub fn image_type_str(t: ImageType) -> &'static str {
    match t {
        ImageType::Raster => "raster",
        ImageType::Svg => "svg",
        ImageType::VectorGraphic => "vector_graphic",
    }
}

pub fn parse_image_type(s: &str) -> Result<ImageType> {
    Ok(match s {
        "raster" => ImageType::Raster,
        "svg" => ImageType::Svg,
        "vector_graphic" => ImageType::VectorGraphic,
        other => return Err(Error::Storage(format!("unknown image_type {other:?}"))),
    })
}

pub fn validation_status_str(s: ValidationStatus) -> &'static str {
    match s {
        ValidationStatus::Unchecked => "unchecked",
        ValidationStatus::Ok => "ok",
        ValidationStatus::Broken => "broken",
        ValidationStatus::Redirected => "redirected",
    }
}

pub fn parse_validation_status(s: &str) -> Result<ValidationStatus> {
    Ok(match s {
        "unchecked" => ValidationStatus::Unchecked,
        "ok" => ValidationStatus::Ok,
        "broken" => ValidationStatus::Broken,
        "redirected" => ValidationStatus::Redirected,
        other => return Err(Error::Storage(format!("unknown validation_status {other:?}"))),
    })
}

pub fn owner_kind_str(k: OwnerKind) -> &'static str {
    match k {
        OwnerKind::Chunk => "chunk",
        OwnerKind::Image => "image",
        OwnerKind::Table => "table",
    }
}

pub fn parse_owner_kind(s: &str) -> Result<OwnerKind> {
    Ok(match s {
        "chunk" => OwnerKind::Chunk,
        "image" => OwnerKind::Image,
        "table" => OwnerKind::Table,
        other => return Err(Error::Storage(format!("unknown owner_kind {other:?}"))),
    })
}

pub fn queue_item_status_str(s: QueueItemStatus) -> &'static str {
    match s {
        QueueItemStatus::Pending => "pending",
        QueueItemStatus::Leased => "leased",
        QueueItemStatus::Completed => "completed",
        QueueItemStatus::Failed => "failed",
        QueueItemStatus::Retrying => "retrying",
    }
}

pub fn parse_queue_item_status(s: &str) -> Result<QueueItemStatus> {
    Ok(match s {
        "pending" => QueueItemStatus::Pending,
        "leased" => QueueItemStatus::Leased,
        "completed" => QueueItemStatus::Completed,
        "failed" => QueueItemStatus::Failed,
        "retrying" => QueueItemStatus::Retrying,
        other => return Err(Error::Storage(format!("unknown queue item status {other:?}"))),
    })
}

pub fn stage_state_str(s: StageState) -> &'static str {
    match s {
        StageState::NotStarted => "not_started",
        StageState::Running => "running",
        StageState::Completed => "completed",
        StageState::Failed => "failed",
        StageState::Skipped => "skipped",
    }
}

pub fn parse_stage_state(s: &str) -> Result<StageState> {
    Ok(match s {
        "not_started" => StageState::NotStarted,
        "running" => StageState::Running,
        "completed" => StageState::Completed,
        "failed" => StageState::Failed,
        "skipped" => StageState::Skipped,
        other => return Err(Error::Storage(format!("unknown stage state {other:?}"))),
    })
}

pub fn pipeline_error_status_str(s: PipelineErrorStatus) -> &'static str {
    match s {
        PipelineErrorStatus::Pending => "pending",
        PipelineErrorStatus::Retrying => "retrying",
        PipelineErrorStatus::Resolved => "resolved",
    }
}

pub fn parse_pipeline_error_status(s: &str) -> Result<PipelineErrorStatus> {
    Ok(match s {
        "pending" => PipelineErrorStatus::Pending,
        "retrying" => PipelineErrorStatus::Retrying,
        "resolved" => PipelineErrorStatus::Resolved,
        other => return Err(Error::Storage(format!("unknown pipeline error status {other:?}"))),
    })
}
