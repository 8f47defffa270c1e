//! Shatter a unit cube and print every fragment

use voronoi_shatter::*;

fn main() -> Result<()> {
    env_logger::init();

    let config = GeneratorConfigBuilder::new()
        .seed(42)
        .num_samples(8)?
        .build()?;

    let source = SourceMesh::new(TriMesh::cuboid(Vec3::splat(0.5)), SourceHandle(1));
    let fragments = VoronoiGenerator::new().create_from_mesh(&source, &config)?;

    println!("Generated {} fragments", fragments.len());
    for fragment in &fragments {
        println!(
            "  #{:<2} at {:>6.3} {:>6.3} {:>6.3}  volume {:.4}  {} triangles",
            fragment.seed_index,
            fragment.position.x,
            fragment.position.y,
            fragment.position.z,
            fragment.volume(),
            fragment.mesh.triangle_count()
        );
    }

    let total: f32 = fragments.iter().map(Fragment::volume).sum();
    println!("Total volume: {:.5}", total);
    Ok(())
}
