//! ニブル化（6-and-2 エンコード）
//!
//! 140KBの論理イメージを物理トラック形式に変換する。
//!
//! 物理セクタ ($1A0 バイト):
//! - アドレスフィールド D5 AA 96 + 4-and-4(ボリューム, トラック, セクタ, チェックサム) + DE AA EB
//! - 同期バイト 5個（ここまでがセクタヘッダ $13 バイト）
//! - データフィールド D5 AA AD + 343バイト + DE AA EB
//! - 同期バイト 48個
//!
//! 各トラックの先頭には $30 バイトの同期バイトが入る。

use crate::disk::{
    LOG_SECTOR_LEN, LOG_TRACK_LEN, NIB_SIZE, NUM_SECTORS, NUM_TRACKS, PHYS_SECTOR_HEADER,
    PHYS_SECTOR_LEN, PHYS_TRACK_HEADER, PHYS_TRACK_LEN,
};
use crate::segment::Segment;

/// 6-and-2エンコーディングテーブル
const WRITE_TABLE: [u8; 64] = [
    0x96, 0x97, 0x9A, 0x9B, 0x9D, 0x9E, 0x9F, 0xA6,
    0xA7, 0xAB, 0xAC, 0xAD, 0xAE, 0xAF, 0xB2, 0xB3,
    0xB4, 0xB5, 0xB6, 0xB7, 0xB9, 0xBA, 0xBB, 0xBC,
    0xBD, 0xBE, 0xBF, 0xCB, 0xCD, 0xCE, 0xCF, 0xD3,
    0xD6, 0xD7, 0xD9, 0xDA, 0xDB, 0xDC, 0xDD, 0xDE,
    0xDF, 0xE5, 0xE6, 0xE7, 0xE9, 0xEA, 0xEB, 0xEC,
    0xED, 0xEE, 0xEF, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6,
    0xF7, 0xF9, 0xFA, 0xFB, 0xFC, 0xFD, 0xFE, 0xFF,
];

/// DOS 3.3セクターインターリーブ
pub const DOS_SECTOR_ORDER: [usize; 16] = [0, 7, 14, 6, 13, 5, 12, 4, 11, 3, 10, 2, 9, 1, 8, 15];

/// ProDOSセクターオーダー
pub const PRODOS_SECTOR_ORDER: [usize; 16] = [0, 8, 1, 9, 2, 10, 3, 11, 4, 12, 5, 13, 6, 14, 7, 15];

const SYNC: u8 = 0xFF;
const ADDR_PROLOGUE: [u8; 3] = [0xD5, 0xAA, 0x96];
const DATA_PROLOGUE: [u8; 3] = [0xD5, 0xAA, 0xAD];
const EPILOGUE: [u8; 3] = [0xDE, 0xAA, 0xEB];

/// 6-and-2 エンコード後のデータ長（補助86 + 本体256 + チェックサム1）
pub const ENCODED_SECTOR_LEN: usize = 343;

/// アドレスフィールド長（プロローグ、4-and-4 ×4、エピローグ）
const ADDR_FIELD_LEN: usize = 3 + 8 + 3;
/// データフィールド長
const DATA_FIELD_LEN: usize = 3 + ENCODED_SECTOR_LEN + 3;
/// データフィールド後の同期バイト数
const GAP3_LEN: usize = PHYS_SECTOR_LEN - PHYS_SECTOR_HEADER - DATA_FIELD_LEN;

/// Segment へ順に書き込むカーソル
struct TrackWriter<'a> {
    seg: &'a mut Segment,
    pos: usize,
}

impl TrackWriter<'_> {
    fn byte(&mut self, value: u8) {
        self.seg.set(self.pos, value);
        self.pos += 1;
    }

    fn bytes(&mut self, values: &[u8]) {
        for &v in values {
            self.byte(v);
        }
    }

    fn sync(&mut self, count: usize) {
        for _ in 0..count {
            self.byte(SYNC);
        }
    }

    /// 4-and-4: 奇数ビットと偶数ビットを $AA と OR して2バイトに
    fn four_and_four(&mut self, value: u8) {
        self.byte((value >> 1) | 0xAA);
        self.byte(value | 0xAA);
    }
}

/// 論理イメージ全体をニブル化
///
/// `image` は `DOS_SIZE` バイトであること（呼び出し側で検証済み）。
pub fn nibblize(image: &[u8], sector_order: &[usize; 16], volume: u8) -> Segment {
    debug_assert_eq!(image.len(), NUM_TRACKS * LOG_TRACK_LEN);

    let mut data = Segment::new(NIB_SIZE);
    for track in 0..NUM_TRACKS {
        let mut w = TrackWriter { seg: &mut data, pos: track * PHYS_TRACK_LEN };
        w.sync(PHYS_TRACK_HEADER);

        for sector in 0..NUM_SECTORS {
            let logical = sector_order[sector];
            let start = track * LOG_TRACK_LEN + logical * LOG_SECTOR_LEN;
            let sector_data = &image[start..start + LOG_SECTOR_LEN];
            write_sector(&mut w, volume, track as u8, sector as u8, sector_data);
        }

        debug_assert_eq!(w.pos, (track + 1) * PHYS_TRACK_LEN);
    }

    data
}

fn write_sector(w: &mut TrackWriter<'_>, volume: u8, track: u8, sector: u8, sector_data: &[u8]) {
    w.bytes(&ADDR_PROLOGUE);
    w.four_and_four(volume);
    w.four_and_four(track);
    w.four_and_four(sector);
    w.four_and_four(volume ^ track ^ sector);
    w.bytes(&EPILOGUE);
    w.sync(PHYS_SECTOR_HEADER - ADDR_FIELD_LEN);

    w.bytes(&DATA_PROLOGUE);
    w.bytes(&encode_6and2(sector_data));
    w.bytes(&EPILOGUE);
    w.sync(GAP3_LEN);
}

/// 6-and-2エンコーディング
///
/// 補助バッファには各バイトの下位2ビットを入れ替えて格納する（P5 PROMのLSR/ROL順）。
pub fn encode_6and2(data: &[u8]) -> [u8; ENCODED_SECTOR_LEN] {
    let mut aux = [0u8; 86];
    for i in 0..86 {
        let swap = |b: u8| ((b & 0x01) << 1) | ((b & 0x02) >> 1);
        let mut value = swap(data[i]);
        value |= swap(data[i + 86]) << 2;
        if i + 172 < LOG_SECTOR_LEN {
            value |= swap(data[i + 172]) << 4;
        }
        aux[85 - i] = value;
    }

    let mut result = [0u8; ENCODED_SECTOR_LEN];
    let mut checksum = 0u8;
    let values = aux.iter().rev().copied().chain(data.iter().map(|b| b >> 2));
    for (out, value) in result.iter_mut().zip(values) {
        *out = WRITE_TABLE[((value ^ checksum) & 0x3F) as usize];
        checksum = value;
    }
    result[ENCODED_SECTOR_LEN - 1] = WRITE_TABLE[(checksum & 0x3F) as usize];

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{DOS_SIZE, VOLUME_MARKER};

    #[test]
    fn test_geometry_adds_up() {
        assert_eq!(ADDR_FIELD_LEN + 5, PHYS_SECTOR_HEADER);
        assert_eq!(GAP3_LEN, 48);
        assert_eq!(NUM_TRACKS * PHYS_TRACK_LEN, NIB_SIZE);
    }

    #[test]
    fn test_encode_zero_sector() {
        let encoded = encode_6and2(&[0u8; 256]);
        // 全ゼロはすべてテーブル先頭
        assert!(encoded.iter().all(|&b| b == 0x96));
    }

    #[test]
    fn test_encoded_bytes_are_valid_disk_bytes() {
        let data: Vec<u8> = (0..=255).collect();
        let encoded = encode_6and2(&data);
        assert!(encoded.iter().all(|b| WRITE_TABLE.contains(b)));
        // 最後のバイトはデータ最終値の上位6ビット
        assert_eq!(encoded[342], WRITE_TABLE[(255u8 >> 2) as usize]);
    }

    #[test]
    fn test_track_layout() {
        let image = vec![0u8; DOS_SIZE];
        let data = nibblize(&image, &DOS_SECTOR_ORDER, VOLUME_MARKER);
        assert_eq!(data.size(), NIB_SIZE);

        // トラック1の先頭は同期バイト、続いてセクタ0のアドレスフィールド
        let base = PHYS_TRACK_LEN;
        assert!((0..PHYS_TRACK_HEADER).all(|i| data.get(base + i) == 0xFF));
        let sector0 = base + PHYS_TRACK_HEADER;
        assert_eq!(&data.as_slice()[sector0..sector0 + 3], &ADDR_PROLOGUE);
        // ボリューム $FE
        assert_eq!(data.get(sector0 + 3), 0xFF);
        assert_eq!(data.get(sector0 + 4), 0xFE);
        // トラック1
        assert_eq!(data.get(sector0 + 5), 0xAA);
        assert_eq!(data.get(sector0 + 6), 0xAB);

        let data_field = sector0 + PHYS_SECTOR_HEADER;
        assert_eq!(&data.as_slice()[data_field..data_field + 3], &DATA_PROLOGUE);

        // セクタ1のアドレスフィールド
        let sector1 = sector0 + PHYS_SECTOR_LEN;
        assert_eq!(&data.as_slice()[sector1..sector1 + 3], &ADDR_PROLOGUE);
        assert_eq!(data.get(sector1 + 7), 0xAA);
        assert_eq!(data.get(sector1 + 8), 0xAB);
    }

    #[test]
    fn test_sector_order_selects_logical_sector() {
        let mut image = vec![0u8; DOS_SIZE];
        // 論理セクタ7だけ非ゼロ
        image[7 * LOG_SECTOR_LEN..8 * LOG_SECTOR_LEN].fill(0xFF);

        let data = nibblize(&image, &DOS_SECTOR_ORDER, VOLUME_MARKER);
        let field = |phys: usize| {
            let start = PHYS_TRACK_HEADER + phys * PHYS_SECTOR_LEN + PHYS_SECTOR_HEADER + 3;
            data.as_slice()[start..start + ENCODED_SECTOR_LEN].to_vec()
        };

        // DOS 3.3 では物理セクタ1が論理セクタ7
        assert_eq!(field(1), encode_6and2(&[0xFF; 256]).to_vec());
        assert_eq!(field(0), encode_6and2(&[0x00; 256]).to_vec());
    }
}
