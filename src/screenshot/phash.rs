use image::RgbaImage;
use image_hasher::{HashAlg, HasherConfig, ImageHash};

/// 12x12 gradient hash width in bits.
pub const HASH_BITS: u32 = 144;

pub fn compute_dhash(img: &RgbaImage) -> String {
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::Gradient)
        .hash_size(12, 12)
        .to_hasher();

    hasher.hash_image(img).to_base64()
}

pub fn hamming_distance(lhs: &str, rhs: &str) -> u32 {
    let Ok(h1) = ImageHash::<Vec<u8>>::from_base64(lhs) else {
        return u32::MAX;
    };
    let Ok(h2) = ImageHash::<Vec<u8>>::from_base64(rhs) else {
        return u32::MAX;
    };
    h1.dist(&h2)
}

/// Similarity in [0, 1] for a given bit distance.
pub fn similarity_from_distance(distance: u32) -> f64 {
    if distance >= HASH_BITS {
        return 0.0;
    }
    1.0 - f64::from(distance) / f64::from(HASH_BITS)
}

/// Similarity between two encoded hashes. Undecodable hashes compare as
/// completely dissimilar.
pub fn similarity(lhs: &str, rhs: &str) -> f64 {
    let distance = hamming_distance(lhs, rhs);
    if distance == u32::MAX {
        return 0.0;
    }
    similarity_from_distance(distance)
}
