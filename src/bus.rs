//! CPUから見たメモリバス

/// メモリバスインターフェース
/// CPUがメモリにアクセスするために必要なトレイト
///
/// 16ビット空間はすべてマップ済みなので、読み書きは常に成功する。
/// 復帰不能なバスフォルトはパニックとして伝わる。
pub trait MemoryBus {
    /// メモリから1バイト読み取り
    fn read(&mut self, address: u16) -> u8;
    /// メモリに1バイト書き込み
    fn write(&mut self, address: u16, value: u8);

    /// リトルエンディアンで16ビット読み取り
    fn read_word(&mut self, address: u16) -> u16 {
        let lo = self.read(address) as u16;
        let hi = self.read(address.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }
}
