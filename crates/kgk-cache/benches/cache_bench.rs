use criterion::{criterion_group, criterion_main, Criterion};
use kgk_cache::{
    CacheStore, MetadataRegistry, ResourceManager, ResourceOrigin, ResourceRecord,
};
use kgk_core::{
    CacheKey, DecodeError, Decoded, EvictionPolicy, LoadOptions, ResourceManagerConfig,
    ResourceType,
};
use kgk_io::BundleContainer;
use std::hint::black_box;
use std::path::PathBuf;
use std::sync::Arc;

fn record(path: &str) -> Arc<ResourceRecord> {
    Arc::new(ResourceRecord::new(
        CacheKey::plain(ResourceType::Image, path),
        LoadOptions::default(),
        ResourceOrigin::File(PathBuf::from(path)),
        Decoded::new((), 64),
    ))
}

fn bench_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("Resource Cache");

    let store = CacheStore::new(ResourceType::Image);
    let key = CacheKey::plain(ResourceType::Image, "hot.png");
    let _ = store.get_or_load(&key, || Ok(record("hot.png")));
    group.bench_function("Store hit", |b| {
        b.iter(|| {
            let lookup = store.get_or_load(black_box(&key), || Ok(record("hot.png")));
            if let Ok(lookup) = lookup {
                lookup.record().release();
            }
        });
    });

    let registry = MetadataRegistry::new();
    for i in 0..1_000 {
        let r = record(&format!("tex/{i}.png"));
        r.release();
        registry.track(r);
    }
    for i in (0..1_000).step_by(3) {
        registry.touch(&CacheKey::plain(ResourceType::Image, &format!("tex/{i}.png")));
    }
    group.bench_function("LRU candidates (1k entries)", |b| {
        b.iter(|| black_box(registry.candidates_for(EvictionPolicy::Lru, 4_096)));
    });

    let dir = std::env::temp_dir().join("kgk-cache-bench");
    let _ = std::fs::create_dir_all(&dir);
    let _ = std::fs::write(dir.join("hero.png"), vec![7u8; 16 * 1024]);
    let manager = ResourceManager::new(ResourceManagerConfig::default().with_root_dir(&dir))
        .unwrap();
    manager.register_loader(
        ResourceType::Image,
        |bytes: &[u8], _: &LoadOptions| -> Result<Decoded, DecodeError> {
            Ok(Decoded::new(bytes.len(), bytes.len() as u64))
        },
    );
    group.bench_function("Manager load + release (cached)", |b| {
        b.iter(|| {
            if let Ok(handle) = manager.load_image(black_box("hero.png"), &LoadOptions::default()) {
                manager.release(&handle);
            }
        });
    });

    group.finish();
}

fn bench_bundle(c: &mut Criterion) {
    let mut writer = BundleContainer::new();
    for i in 0..64 {
        let _ = writer.add_data(&format!("tex/{i}.png"), vec![i as u8; 8 * 1024]);
    }
    let raw = writer.to_bytes(false).unwrap();
    let packed = writer.to_bytes(true).unwrap();
    let raw = BundleContainer::from_bytes(raw, "raw").unwrap();
    let packed = BundleContainer::from_bytes(packed, "packed").unwrap();

    let mut group = c.benchmark_group("Bundle Reads");
    group.bench_function("Uncompressed entry", |b| {
        b.iter(|| black_box(raw.get_data("tex/17.png")));
    });
    group.bench_function("RLE entry", |b| {
        b.iter(|| black_box(packed.get_data("tex/17.png")));
    });
    group.finish();
}

criterion_group!(benches, bench_cache, bench_bundle);
criterion_main!(benches);
