//! メモリセグメント
//!
//! メインRAM、補助RAM、ROM、ディスクバッファなど、すべての記憶領域の基本単位。
//! 範囲外アクセスはバスフォルト（復帰不能）として扱う。

use std::fmt;

/// 一括コピー時の範囲エラー（復帰可能）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentError {
    /// コピー先が範囲外
    OutOfBounds {
        start: usize,
        end: usize,
        size: usize,
    },
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentError::OutOfBounds { start, end, size } => write!(
                f,
                "destination slice is out of bounds: {}..{} (segment size {})",
                start, end, size
            ),
        }
    }
}

impl std::error::Error for SegmentError {}

/// 固定長のバイト列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    mem: Vec<u8>,
}

impl Segment {
    /// ゼロ初期化されたセグメントを作成
    pub fn new(size: usize) -> Self {
        Segment { mem: vec![0; size] }
    }

    /// 既存のバイト列からセグメントを作成
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Segment { mem: bytes.to_vec() }
    }

    /// セル数
    pub fn size(&self) -> usize {
        self.mem.len()
    }

    pub fn len(&self) -> usize {
        self.mem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mem
    }

    /// 全セルを同じ値で埋める
    pub fn fill(&mut self, value: u8) {
        self.mem.fill(value);
    }

    /// 1バイト読み取り
    ///
    /// 範囲外アドレスは実機のアドレスデコード異常に相当し、エミュレーションを継続できない。
    #[inline]
    pub fn get(&self, address: usize) -> u8 {
        match self.mem.get(address) {
            Some(&value) => value,
            None => bus_fault(address, self.mem.len()),
        }
    }

    /// 1バイト書き込み（範囲外はバスフォルト）
    #[inline]
    pub fn set(&mut self, address: usize, value: u8) {
        let size = self.mem.len();
        match self.mem.get_mut(address) {
            Some(cell) => *cell = value,
            None => bus_fault(address, size),
        }
    }

    /// `start` から `bytes` を一括コピーし、書き込んだバイト数を返す
    ///
    /// 範囲外の場合は何も書き込まずにエラーを返す（イメージ読み込み側で判断する）。
    pub fn copy_slice(&mut self, start: usize, bytes: &[u8]) -> Result<usize, SegmentError> {
        let size = self.mem.len();
        let end = match start.checked_add(bytes.len()) {
            Some(end) if end <= size => end,
            _ => {
                return Err(SegmentError::OutOfBounds {
                    start,
                    end: start.saturating_add(bytes.len()),
                    size,
                })
            }
        };

        self.mem[start..end].copy_from_slice(bytes);
        Ok(bytes.len())
    }
}

#[cold]
#[inline(never)]
fn bus_fault(address: usize, size: usize) -> ! {
    panic!("Memory access fault: address {} (segment size {})", address, size);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_get_set_round_trip() {
        let mut rng = rand::thread_rng();
        let mut seg = Segment::new(0x1000);
        for _ in 0..256 {
            let addr = rng.gen_range(0..seg.size());
            let value: u8 = rng.gen();
            seg.set(addr, value);
            assert_eq!(seg.get(addr), value);
        }
    }

    #[test]
    fn test_size() {
        assert_eq!(Segment::new(0x100).size(), 0x100);
        assert!(Segment::new(0).is_empty());
    }

    #[test]
    #[should_panic(expected = "Memory access fault")]
    fn test_get_out_of_bounds() {
        let seg = Segment::new(0x100);
        seg.get(0x100);
    }

    #[test]
    #[should_panic(expected = "Memory access fault")]
    fn test_set_out_of_bounds() {
        let mut seg = Segment::new(0x100);
        seg.set(0x100, 0xFF);
    }

    #[test]
    #[should_panic(expected = "Memory access fault")]
    fn test_empty_segment_faults() {
        let seg = Segment::new(0);
        seg.get(0);
    }

    #[test]
    fn test_copy_slice() {
        let mut seg = Segment::new(8);
        assert_eq!(seg.copy_slice(2, &[1, 2, 3]), Ok(3));
        assert_eq!(seg.as_slice(), &[0, 0, 1, 2, 3, 0, 0, 0]);

        // 末尾ぴったり
        assert_eq!(seg.copy_slice(5, &[7, 8, 9]), Ok(3));
        assert_eq!(seg.get(7), 9);
    }

    #[test]
    fn test_copy_slice_out_of_bounds_leaves_segment_untouched() {
        let mut seg = Segment::new(4);
        let err = seg.copy_slice(2, &[1, 2, 3]).unwrap_err();
        assert_eq!(err, SegmentError::OutOfBounds { start: 2, end: 5, size: 4 });
        assert_eq!(seg.as_slice(), &[0, 0, 0, 0]);
        assert!(err.to_string().contains("out of bounds"));

        assert!(seg.copy_slice(usize::MAX, &[1]).is_err());
    }
}
