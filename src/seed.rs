use crate::grid::Cell;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Перемешивание splitmix64
#[must_use]
pub fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Подсид чанка: зависит только от сида и координат, не от порядка загрузки.
/// Явная формула (а не `DefaultHasher`), чтобы значение не менялось между сборками.
#[must_use]
pub fn chunk_seed(seed: u64, cx: i32, cy: i32) -> u64 {
    let hx = i64::from(cx).wrapping_mul(73_856_093) as u64;
    let hy = i64::from(cy).wrapping_mul(19_349_663) as u64;
    mix64(seed ^ hx ^ mix64(hy))
}

/// Сид отдельной клетки (выбор варианта при внешних изменениях тайлов)
#[must_use]
pub fn cell_seed(seed: u64, cell: Cell, salt: u64) -> u64 {
    mix64(chunk_seed(seed, cell.x, cell.y) ^ salt)
}

#[must_use]
pub fn chunk_rng(seed: u64, cx: i32, cy: i32) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(chunk_seed(seed, cx, cy))
}

#[must_use]
pub fn cell_rng(seed: u64, cell: Cell, salt: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(cell_seed(seed, cell, salt))
}
