//! Complete workflow demonstration for voronoi_shatter

use voronoi_shatter::*;

fn main() -> Result<()> {
    env_logger::init();
    println!("=== voronoi_shatter Complete Demo ===\n");

    // Step 1: Configure the fracture
    println!("Step 1: Configuring fracture...");
    let config = GeneratorConfigBuilder::new()
        .seed(12345)
        .num_samples(48)?
        .relax_iterations(3)?
        .build()?;

    println!("  Seed: {}", config.random_seed);
    println!("  Samples: {}", config.num_samples);
    println!("  Relax iterations: {}", config.relax_iterations);

    // Step 2: Place a source mesh in the world
    println!("\nStep 2: Preparing source...");
    let sphere = TriMesh::icosphere(1.5, 3);
    let source = SourceMesh::new(sphere, SourceHandle(7))
        .with_transform(Affine3A::from_translation(Vec3::new(0.0, 4.0, 0.0)));
    println!(
        "  {} vertices, {} triangles, volume {:.3}",
        source.mesh.vertex_count(),
        source.mesh.triangle_count(),
        source.mesh.volume()
    );

    // Step 3: Shatter
    println!("\nStep 3: Shattering...");
    let generator = VoronoiGenerator::new();
    let shatter = generator.shatter(&source, &config)?;
    println!("  Fragments: {}", shatter.fragment_count());
    println!("  Dropped cells: {}", shatter.dropped().len());
    println!(
        "  Volume: {:.4} of {:.4} ({:.2}%)",
        shatter.total_volume(),
        shatter.source_volume(),
        shatter.total_volume() / shatter.source_volume() * 100.0
    );

    // Step 4: Fragment statistics
    println!("\nStep 4: Fragment sizes:");
    let mut volumes: Vec<f32> = shatter.fragments().iter().map(Fragment::volume).collect();
    volumes.sort_by(f32::total_cmp);
    if let (Some(min), Some(max)) = (volumes.first(), volumes.last()) {
        println!("  Smallest: {:.4}", min);
        println!("  Largest:  {:.4}", max);
        println!("  Median:   {:.4}", volumes[volumes.len() / 2]);
    }

    // Step 5: Adjacency and spatial queries
    println!("\nStep 5: Queries:");
    #[cfg(feature = "spatial-index")]
    {
        let query = Vec3::new(0.0, 4.0, 0.0);
        if let Some(fragment) = shatter.find_fragment_at(query) {
            println!("  Position {:?} -> fragment {}", query, fragment.seed_index);
            let neighbors = shatter.fragment_neighbors(fragment.seed_index);
            println!("  Fragment has {} neighbors", neighbors.len());
            let nearby = shatter.find_fragments_within_hops(fragment.seed_index, 2);
            println!("  {} fragments within 2 hops", nearby.len());
        }
    }

    // Memory estimate
    let bytes: usize = shatter
        .fragments()
        .iter()
        .map(|f| f.mesh.positions.len() * 12 + f.mesh.indices.len() * 12)
        .sum();
    println!("\n  Mesh memory: {:.2} KB", bytes as f32 / 1024.0);

    println!("\n=== Demo Complete ===");
    Ok(())
}
