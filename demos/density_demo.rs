//! Compare uniform, texture and noise density fields

use voronoi_shatter::*;

fn summarize(name: &str, shatter: &Shatter) {
    let volumes: Vec<f32> = shatter.fragments().iter().map(Fragment::volume).collect();
    let mean = shatter.total_volume() / volumes.len().max(1) as f32;
    let spread = volumes.iter().copied().fold(0.0f32, f32::max) - volumes.iter().copied().fold(f32::MAX, f32::min);
    println!(
        "{:<10} {:>3} seeds  {:>3} fragments  mean volume {:.4}  spread {:.4}",
        name,
        shatter.seeds().len(),
        shatter.fragment_count(),
        mean,
        spread
    );
}

fn main() -> Result<()> {
    env_logger::init();

    let source = SourceMesh::new(TriMesh::cuboid(Vec3::new(2.0, 0.5, 0.5)), SourceHandle(3));
    let generator = VoronoiGenerator::new();

    let base = GeneratorConfigBuilder::new().seed(2024).num_samples(64)?.build()?;
    summarize("uniform", &generator.shatter(&source, &base)?);

    // Dense at -X, fading out towards +X
    let ramp = VolumeTexture::from_fn(16, 1, 1, |x, _, _| 1.0 - x as f32 / 15.0);
    let textured = GeneratorConfigBuilder::new()
        .seed(2024)
        .num_samples(64)?
        .density(ramp)
        .build()?;
    summarize("ramp", &generator.shatter(&source, &textured)?);

    let noise = NoiseDensity::new(2024).with_frequency(2.0).with_octaves(2);
    summarize("noise", &generator.shatter_with_density(&source, &base, &noise)?);

    Ok(())
}
