use pkgatlas::label::{from_fn, LabelCandidate};
use pkgatlas::{
    cluster_docs, edge_docs, generate_labels, package_docs, LabelBudget, Package, Pipeline,
    PipelineConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Minimal end-to-end: synthetic embeddings -> clusters -> coordinates
    // -> constellations -> labels -> front-end documents.
    //
    // It intentionally stays small: it exists primarily to validate that the
    // integration path builds and runs. A real deployment feeds package
    // records with model embeddings and a network-backed labeler.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Three obvious groups in 8D, with a little per-package offset.
    let mut packages = Vec::new();
    for (g, topic) in ["http clients", "array math", "cli tooling"].iter().enumerate() {
        for i in 0..12 {
            let mut embedding = vec![0.0f32; 8];
            embedding[g * 2] = 1.0;
            embedding[g * 2 + 1] = 0.2 + i as f32 * 0.01;
            packages.push(Package {
                name: format!("pkg-{g}-{i}"),
                weekly_downloads: 1_000 * (g as u64 + 1) + i as u64,
                summary: format!("a {topic} package"),
                embedding,
            });
        }
    }

    // Shrink the neighborhood and cluster-size parameters to fit 36 points.
    let mut config = PipelineConfig::default();
    config.clustering_reducer.n_components = 4;
    config.clustering_reducer.n_neighbors = 6;
    config.projection_reducer.n_neighbors = 6;
    config.clusterer.min_cluster_size = 6;
    config.constellations.cutoff_length_frac = 1.0;

    let atlas = Pipeline::new(config).run(&packages)?;

    // A stand-in labeler: a real one calls out to a language model.
    let labeler = from_fn(|members: &[LabelCandidate<'_>]| {
        Ok(members
            .first()
            .map(|m| m.summary.to_string())
            .unwrap_or_default())
    });
    let labels = generate_labels(&labeler, &atlas.clustered, &LabelBudget::default());

    let (package_list, name_to_id) = package_docs(&atlas.clustered);
    let cluster_list = cluster_docs(&atlas.metadata, &labels);
    let edge_list = edge_docs(&atlas.edges, &name_to_id);

    println!(
        "packages={} clusters={} edges={}",
        package_list.len(),
        cluster_list.len(),
        edge_list.len()
    );
    for cluster in &cluster_list {
        println!(
            "  cluster {}: '{}' downloads={}",
            cluster.cluster_id, cluster.label, cluster.downloads
        );
    }

    Ok(())
}
