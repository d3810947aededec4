use super::TaskManager;
use super::test_helpers::*;
use crate::error::Error;
use crate::progress::ProgressEvent;
use crate::types::{
    CancelOutcome, CheckedTask, DownloadRequest, Event, MediaKind, Status, WaitMode,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

mod query;
