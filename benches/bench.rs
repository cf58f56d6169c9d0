// Criterion benchmarks for donor ranking

use blood_match::core::{
    compatibility::compatible_donors, distance::geodesic_distance_km, filters::location_text_matches,
    Matcher, ReferenceSource,
};
use blood_match::models::{BloodGroup, Coordinates, Donor};
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uuid::Uuid;

const HUBLI: Coordinates = Coordinates { latitude: 15.3647, longitude: 75.1240 };

fn create_donor(id: usize, lat: f64, lon: f64) -> Donor {
    Donor {
        id: Uuid::new_v4(),
        name: format!("Donor {}", id),
        email: format!("donor{}@example.com", id),
        contact: "9000000000".to_string(),
        blood_group: BloodGroup::ALL[id % 8],
        age: 18 + (id % 40) as i32,
        gender: if id % 2 == 0 { "female" } else { "male" }.to_string(),
        location: format!("ward {} hubli", id % 60),
        // Every tenth donor has not been geocoded yet
        latitude: (id % 10 != 0).then_some(lat),
        longitude: (id % 10 != 0).then_some(lon),
        geocode_stale: false,
        available: id % 7 != 0,
        created_at: Utc::now(),
    }
}

fn create_donors(count: usize) -> Vec<Donor> {
    (0..count)
        .map(|i| {
            let lat_offset = (i as f64 * 0.0007) % 0.3 - 0.15;
            let lon_offset = (i as f64 * 0.0011) % 0.3 - 0.15;
            create_donor(i, HUBLI.latitude + lat_offset, HUBLI.longitude + lon_offset)
        })
        .collect()
}

fn bench_geodesic_distance(c: &mut Criterion) {
    let to = Coordinates::new(15.4589, 75.0078);

    c.bench_function("geodesic_distance_km", |b| {
        b.iter(|| geodesic_distance_km(black_box(Some(HUBLI)), black_box(to)));
    });
}

fn bench_rank_by_distance(c: &mut Criterion) {
    let matcher = Matcher::default();

    let mut group = c.benchmark_group("rank_by_distance");

    for donor_count in [10, 100, 1000, 5000].iter() {
        let donors = create_donors(*donor_count);

        for (label, source) in [("gps", ReferenceSource::Gps), ("manual", ReferenceSource::Manual)] {
            group.bench_with_input(BenchmarkId::new(label, donor_count), donor_count, |b, _| {
                b.iter(|| {
                    matcher.rank_by_distance(
                        black_box(HUBLI),
                        source,
                        black_box(donors.clone()),
                        black_box(10.0),
                    )
                });
            });
        }
    }

    group.finish();
}

fn bench_text_fallback(c: &mut Criterion) {
    let matcher = Matcher::default();
    let donors = create_donors(1000);

    c.bench_function("text_fallback_1000_donors", |b| {
        b.iter(|| matcher.text_fallback(black_box("ward 12 hubli"), black_box(donors.clone())));
    });

    c.bench_function("location_text_matches", |b| {
        b.iter(|| location_text_matches(black_box("near prashant nagar, hubli"), black_box("prashant nagar hubli")));
    });
}

fn bench_search_pipeline(c: &mut Criterion) {
    let matcher = Matcher::default();
    let donors = create_donors(1000);

    c.bench_function("eligible_then_rank_1000_donors", |b| {
        b.iter(|| {
            let candidates = matcher.eligible_donors(black_box(donors.clone()), Some(BloodGroup::ONegative));
            let ranked = matcher.rank_by_distance(HUBLI, ReferenceSource::Manual, candidates, 10.0);
            black_box((ranked, compatible_donors(BloodGroup::ABPositive)))
        });
    });
}

criterion_group!(
    benches,
    bench_geodesic_distance,
    bench_rank_by_distance,
    bench_text_fallback,
    bench_search_pipeline
);

criterion_main!(benches);
