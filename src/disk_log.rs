//! Disk II ログシステム
//!
//! 原則:
//! 1. ログは「現象」ではなく「状態遷移」を記録
//! 2. 毎回のニブル読み書きは記録しない
//! 3. カテゴリで絞り込み、出力は `log` クレート経由（target = "disk"）

use std::sync::atomic::{AtomicU32, Ordering};

use crate::disk::ImageType;

bitflags::bitflags! {
    /// ログカテゴリ
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DiskLogLevel: u32 {
        /// 何が起きているか（イメージのロード、イジェクト）
        const FLOW  = 0b0001;
        /// ヘッド位置・フェーズの遷移
        const STATE = 0b0010;
    }
}

impl DiskLogLevel {
    /// カテゴリ名から変換（設定ファイル用）。未知の名前は無視
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        names.iter().fold(DiskLogLevel::empty(), |acc, name| {
            match name.as_ref().to_ascii_lowercase().as_str() {
                "flow" => acc | DiskLogLevel::FLOW,
                "state" => acc | DiskLogLevel::STATE,
                other => {
                    log::warn!("Unknown disk log category: {}", other);
                    acc
                }
            }
        })
    }
}

/// 有効なカテゴリ（プロセス全体でひとつ）
static LOG_LEVEL: AtomicU32 = AtomicU32::new(0);

/// ログレベルを設定
pub fn set_log_level(level: DiskLogLevel) {
    LOG_LEVEL.store(level.bits(), Ordering::Relaxed);
}

/// 現在のログレベルを取得
pub fn get_log_level() -> DiskLogLevel {
    DiskLogLevel::from_bits_truncate(LOG_LEVEL.load(Ordering::Relaxed))
}

/// ログレベルが有効かチェック
#[inline]
pub fn is_enabled(flag: DiskLogLevel) -> bool {
    (LOG_LEVEL.load(Ordering::Relaxed) & flag.bits()) != 0
}

/// [FLOW] イメージロード
pub fn log_image_loaded(image_type: ImageType, bytes: usize) {
    if is_enabled(DiskLogLevel::FLOW) {
        log::info!(target: "disk", "Image loaded: {:?} ({} bytes)", image_type, bytes);
    }
}

/// [FLOW] イメージ取り外し
pub fn log_image_ejected() {
    if is_enabled(DiskLogLevel::FLOW) {
        log::info!(target: "disk", "Image ejected");
    }
}

/// [FLOW] 書き込み禁止ディスクへの書き込み
pub fn log_write_refused(track: usize, pos: usize) {
    if is_enabled(DiskLogLevel::FLOW) {
        log::info!(target: "disk", "Write refused (write protected) T={} pos={}", track, pos);
    }
}

/// [STATE] トラック変更
pub fn log_track_change(from: usize, to: usize) {
    if is_enabled(DiskLogLevel::STATE) {
        log::debug!(target: "disk", "Track {} -> {}", from, to);
    }
}

/// [STATE] ステッパーフェーズ
pub fn log_phase(from: usize, to: usize, offset: i32) {
    if is_enabled(DiskLogLevel::STATE) {
        log::trace!(target: "disk", "Phase {} -> {} (step {:+})", from, to, offset);
    }
}
