use std::hint::black_box;
use std::rc::Rc;

use criterion::{Criterion, criterion_group, criterion_main};
use sticky_sentinel::{
    Boundary, BoundaryRouter, ChangeRecord, ClientRect, HeadlessHost, LOCATION_ATTR, OWNER_ATTR,
    ObservationRegistry, OwnerId, ProviderConfig, SentinelGeometry, TaggedNode, TrackedElement,
    TrackedElementConfig, ViewportProvider,
};

const SECTIONS: usize = 64;
const SECTION_HEIGHT: f64 = 300.0;

#[derive(Clone)]
struct BenchNode {
    owner: String,
}

impl TaggedNode for BenchNode {
    fn attribute(&self, name: &str) -> Option<String> {
        match name {
            LOCATION_ATTR => Some("top".to_string()),
            OWNER_ATTR => Some(self.owner.clone()),
            _ => None,
        }
    }
}

fn router_batch(c: &mut Criterion) {
    let registry = ObservationRegistry::new();
    for index in 0..SECTIONS {
        registry.register(OwnerId::new(format!("owner-{index}")), Rc::new(|_: bool| {}));
    }
    let router = BoundaryRouter::new(registry);
    let root = Some(ClientRect::vertical(0.0, 100.0));
    let batch: Vec<_> = (0..SECTIONS)
        .map(|index| ChangeRecord {
            target: BenchNode {
                owner: format!("owner-{index}"),
            },
            bounding_rect: ClientRect::vertical(-40.0 + index as f64, -10.0 + index as f64),
            root_bounds: root,
            intersection_ratio: 0.0,
        })
        .collect();

    c.bench_function("router_top_batch_64", |b| {
        b.iter(|| router.route(Boundary::Top, black_box(&batch)));
    });
}

fn headless_scroll_sweep(c: &mut Criterion) {
    c.bench_function("headless_scroll_sweep_64_sections", |b| {
        b.iter(|| {
            let host = HeadlessHost::new(800.0);
            let scroller = host.scroll_container(ClientRect::vertical(0.0, 600.0));
            let mut provider = ViewportProvider::new(host.clone(), ProviderConfig::default());
            provider.resolve_root(scroller.clone());

            let mut elements = Vec::with_capacity(SECTIONS);
            for index in 0..SECTIONS {
                let section = host
                    .append_block(Some(&scroller), index as f64 * SECTION_HEIGHT, SECTION_HEIGHT)
                    .expect("section");
                let header = host.append_block(Some(&section), 0.0, 20.0).expect("header");
                host.set_position(&header, "sticky").expect("position");

                let config = TrackedElementConfig::new(SentinelGeometry::new("40px", "-24px", "96px"))
                    .with_diagnostics(false);
                let mut element = TrackedElement::new(provider.handle(), config);
                element.mount(&header).expect("mount");
                elements.push(element);
            }

            let mut y = 0.0;
            while y < SECTIONS as f64 * SECTION_HEIGHT {
                host.scroll_to(Some(&scroller), y).expect("scroll");
                host.flush();
                y += 37.0;
            }
            black_box(elements.iter().filter(|element| element.is_stuck()).count())
        });
    });
}

criterion_group!(benches, router_batch, headless_scroll_sweep);
criterion_main!(benches);
