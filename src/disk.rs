//! Apple II Disk II ドライブエミュレーション
//!
//! ステッパーモーターによるヘッド移動（ハーフトラック単位）と、
//! ニブル化されたトラックデータ上の回転位置を管理する。
//! コントローラ側はフェーズI/Oで `step_phase`、ラッチ読み書きで `read_byte` / `write_byte` を呼ぶ。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::disk_log::{
    log_image_ejected, log_image_loaded, log_phase, log_track_change, log_write_refused,
};
use crate::nibble::{self, DOS_SECTOR_ORDER, PRODOS_SECTOR_ORDER};
use crate::segment::{Segment, SegmentError};

/// トラックパディングに書き込むボリューム番号
pub const VOLUME_MARKER: u8 = 0xFE;

/// ディスクの定数
pub const NUM_TRACKS: usize = 35;
pub const NUM_SECTORS: usize = 16;
/// 論理セクタ長 (256バイト)
pub const LOG_SECTOR_LEN: usize = 0x100;
/// 論理トラック長 (4KB)
pub const LOG_TRACK_LEN: usize = LOG_SECTOR_LEN * NUM_SECTORS;

/// 物理セクタ長（ヘッダ込み）
pub const PHYS_SECTOR_LEN: usize = 0x1A0;
/// 物理セクタヘッダ長
pub const PHYS_SECTOR_HEADER: usize = 0x13;
/// トラック先頭のパディング
pub const PHYS_TRACK_HEADER: usize = 0x30;
/// 物理トラック長
pub const PHYS_TRACK_LEN: usize = (PHYS_SECTOR_LEN * NUM_SECTORS) + PHYS_TRACK_HEADER;

/// ヘッドの最大ステップ数（35トラック = 70ハーフトラック）
pub const MAX_STEPS: usize = 70;
/// トラック内セクタ位置の上限 (4KB - 1)
pub const MAX_SECTOR_POS: usize = 0xFFF;

/// 140KB 論理イメージ (DOS 3.3 / ProDOS)
pub const DOS_SIZE: usize = 143_360;
/// ニブル化データのサイズ
pub const NIB_SIZE: usize = 234_640;
/// *.NIB ファイルの1トラック (6656バイト、トラック先頭のパディングなし)
pub const NIB_TRACK_LEN: usize = 0x1A00;
/// *.NIB ファイルのサイズ
pub const NIB_IMAGE_SIZE: usize = NIB_TRACK_LEN * NUM_TRACKS;

/// ステッパーフェーズ遷移テーブル（現在フェーズ * 5 + 新フェーズ）
///
/// 隣接フェーズへの遷移だけがヘッドを動かす。
#[rustfmt::skip]
const PHASE_TRANSITIONS: [i32; 25] = [
//  0   1   2   3   4     新フェーズ
    0,  0,  0,  0,  0,  // フェーズなし
    0,  0,  1,  0, -1,  // フェーズ1
    0, -1,  0,  1,  0,  // フェーズ2
    0,  0, -1,  0,  1,  // フェーズ3
    0,  1,  0, -1,  0,  // フェーズ4
];

/// ディスクイメージ形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageType {
    Dos33,
    ProDos,
    /// *.NIB（既にニブル化済み）
    Nibble,
}

impl ImageType {
    /// 論理セクタの並び（ニブルイメージはなし）
    pub fn sector_order(&self) -> Option<&'static [usize; 16]> {
        match self {
            ImageType::Dos33 => Some(&DOS_SECTOR_ORDER),
            ImageType::ProDos => Some(&PRODOS_SECTOR_ORDER),
            ImageType::Nibble => None,
        }
    }

    /// 拡張子から判定 (.dsk/.do/.po/.nib)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "dsk" | "do" => Some(ImageType::Dos33),
            "po" => Some(ImageType::ProDos),
            "nib" => Some(ImageType::Nibble),
            _ => None,
        }
    }

    /// Image セグメントの容量
    pub fn image_size(&self) -> usize {
        match self {
            ImageType::Dos33 | ImageType::ProDos => DOS_SIZE,
            ImageType::Nibble => NIB_IMAGE_SIZE,
        }
    }
}

/// ドライブモード（書き込み禁止とは無関係）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveMode {
    Read,
    Write,
}

/// イメージ読み込みエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskError {
    /// 論理イメージのサイズが不正
    ImageSize { expected: usize, actual: usize },
    /// コピー先に収まらない
    Bounds(SegmentError),
    /// ドライブ番号が不正
    InvalidDrive(usize),
}

impl fmt::Display for DiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskError::ImageSize { expected, actual } => {
                write!(f, "invalid image size: expected {} bytes, got {}", expected, actual)
            }
            DiskError::Bounds(e) => write!(f, "{}", e),
            DiskError::InvalidDrive(n) => write!(f, "invalid drive number: {}", n),
        }
    }
}

impl std::error::Error for DiskError {}

impl From<SegmentError> for DiskError {
    fn from(e: SegmentError) -> Self {
        DiskError::Bounds(e)
    }
}

/// ステッパーフェーズをアドレス下位4ビットから取得
///
/// $x1→1, $x3→2, $x5→3, $x7→4。それ以外はフェーズなし。
pub fn disk_phase(address: u16) -> Option<usize> {
    match address & 0xF {
        0x1 => Some(1),
        0x3 => Some(2),
        0x5 => Some(3),
        0x7 => Some(4),
        _ => None,
    }
}

/// *.NIB イメージを物理トラック長に並べ直す
///
/// 各トラックの末尾 (PHYS_TRACK_LEN - NIB_TRACK_LEN バイト) は同期バイトで埋める。
fn nib_to_tracks(image: &[u8]) -> Result<Segment, SegmentError> {
    let mut data = Segment::new(NIB_SIZE);
    data.fill(0xFF);
    for (track, bytes) in image.chunks(NIB_TRACK_LEN).enumerate() {
        data.copy_slice(track * PHYS_TRACK_LEN, bytes)?;
    }
    Ok(data)
}

/// フロッピードライブの状態
#[derive(Debug, Clone)]
pub struct Drive {
    /// 最後に励磁したフェーズ (0-4、0はなし)
    pub(crate) phase: usize,
    /// 最後に読み書きしたバイト
    pub latch: u8,
    /// ヘッド位置（ハーフトラック、0-70）
    pub track_pos: usize,
    /// トラック内のバイト位置
    pub sector_pos: usize,
    /// ニブル化データ
    pub data: Option<Segment>,
    /// ロードしたままのイメージ
    pub image: Option<Segment>,
    pub image_type: ImageType,
    pub mode: DriveMode,
    /// モーターON
    pub online: bool,
    pub write_protect: bool,
    /// ヘッドのシーク禁止
    pub locked: bool,
}

impl Default for Drive {
    fn default() -> Self {
        Self::new()
    }
}

impl Drive {
    /// DOS 3.3イメージ用の新しいドライブ
    pub fn new() -> Self {
        Drive {
            phase: 0,
            latch: 0,
            track_pos: 0,
            sector_pos: 0,
            data: None,
            image: None,
            image_type: ImageType::Dos33,
            mode: DriveMode::Read,
            online: false,
            write_protect: false,
            locked: false,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    /// 最後に励磁したフェーズ
    pub fn phase(&self) -> usize {
        self.phase
    }

    /// 現在のトラック番号
    pub fn track(&self) -> usize {
        self.track_pos / 2
    }

    /// ニブル化データ上の現在位置
    pub fn position(&self) -> usize {
        if self.data.is_none() {
            return 0;
        }

        (self.track() * PHYS_TRACK_LEN) + self.sector_pos
    }

    /// トラック内の位置を前後に動かす
    ///
    /// トラックの端を越える場合は部分的に折り返さず0に戻す。
    pub fn shift(&mut self, offset: i32) {
        if self.locked {
            return;
        }

        let pos = self.sector_pos as i64 + offset as i64;
        self.sector_pos = if pos < 0 || pos >= PHYS_TRACK_LEN as i64 {
            0
        } else {
            pos as usize
        };
    }

    /// ヘッドを内周(offset > 0)・外周(offset < 0)に動かす
    ///
    /// 移動量が0でも回転位置の同期は失われる。
    pub fn step(&mut self, offset: i32) {
        let from = self.track();
        let pos = (self.track_pos as i64 + offset as i64).clamp(0, MAX_STEPS as i64);
        self.track_pos = pos as usize;
        self.sector_pos = 0;

        if self.track() != from {
            log_track_change(from, self.track());
        }
    }

    /// フェーズI/Oアドレスからヘッドを動かす
    pub fn step_phase(&mut self, address: u16) {
        let Some(phase) = disk_phase(address) else {
            return;
        };

        // 表にない組み合わせは移動なし
        let offset = PHASE_TRANSITIONS.get((self.phase * 5) + phase).copied().unwrap_or(0);
        log_phase(self.phase, phase, offset);
        self.step(offset);

        self.phase = phase;
    }

    /// ディスクイメージをロード
    ///
    /// 失敗時はドライブの状態を変更しない。
    pub fn load(&mut self, bytes: &[u8], image_type: ImageType) -> Result<usize, DiskError> {
        let expected = image_type.image_size();
        if bytes.len() != expected {
            return Err(DiskError::ImageSize { expected, actual: bytes.len() });
        }

        let mut image = Segment::new(image_type.image_size());
        let written = image.copy_slice(0, bytes)?;

        let data = match image_type.sector_order() {
            Some(order) => nibble::nibblize(image.as_slice(), order, VOLUME_MARKER),
            None => nib_to_tracks(image.as_slice())?,
        };

        self.image = Some(image);
        self.data = Some(data);
        self.image_type = image_type;
        self.sector_pos = 0;

        log_image_loaded(image_type, written);
        Ok(written)
    }

    /// ディスクをイジェクト
    pub fn eject(&mut self) {
        self.data = None;
        self.image = None;
        self.sector_pos = 0;
        log_image_ejected();
    }

    /// 現在位置のニブルを読み、1バイト進める
    ///
    /// ディスクがない、または最終トラックより外側では $FF を返す。
    pub fn read_byte(&mut self) -> u8 {
        let pos = self.position();
        let value = match &self.data {
            Some(data) if pos < data.size() => data.get(pos),
            _ => 0xFF,
        };

        self.latch = value;
        self.shift(1);
        value
    }

    /// 書き込みモードなら現在位置に書き込み、1バイト進める
    pub fn write_byte(&mut self, value: u8) {
        if self.mode != DriveMode::Write {
            return;
        }

        let pos = self.position();
        if self.write_protect {
            log_write_refused(self.track(), pos);
            return;
        }

        if let Some(data) = self.data.as_mut() {
            if pos < data.size() {
                data.set(pos, value);
            }
        }

        self.latch = value;
        self.shift(1);
    }
}
