#![no_main]

//! Fuzz target for declaration and resolution
//!
//! Declares random dependency graphs over a handful of node types and checks
//! every resolution against a model of the graph: acyclic chains resolve,
//! chains reaching an unbound node fail `NotFound`, and cycles fail with a
//! closed loop path.

use arbitrary::Arbitrary;
use bindery::prelude::*;
use bindery::{Binding, Declaration, OverrideViolation};
use libfuzzer_sys::fuzz_target;

const NODES: u8 = 4;

struct Node<const I: u8>;

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Kind {
    Provider,
    Singleton,
}

#[derive(Debug, Arbitrary)]
struct Declare {
    node: u8,
    depends_on: Option<u8>,
    kind: Kind,
    overriding: bool,
}

#[derive(Debug, Arbitrary)]
struct Scenario {
    silent_override: bool,
    declarations: Vec<Declare>,
    resolutions: Vec<u8>,
}

#[derive(Debug, PartialEq)]
enum Expected {
    Resolves,
    Unbound,
    Loop,
}

fn resolve_node<R: Resolve>(resolver: &R, node: u8) -> bindery::Result<()> {
    match node % NODES {
        0 => resolver.get::<Node<0>>().map(drop),
        1 => resolver.get::<Node<1>>().map(drop),
        2 => resolver.get::<Node<2>>().map(drop),
        _ => resolver.get::<Node<3>>().map(drop),
    }
}

fn node_binding<const I: u8>(depends_on: Option<u8>, kind: Kind) -> Binding {
    let create = move |r: &Resolver<'_>| {
        if let Some(dependency) = depends_on {
            resolve_node(r, dependency)?;
        }
        Ok(Node::<I>)
    };
    match kind {
        Kind::Provider => Binding::provider(create),
        Kind::Singleton => Binding::singleton(create),
    }
    .expect("node types are not unit")
}

fn binding(node: u8, depends_on: Option<u8>, kind: Kind) -> Binding {
    match node {
        0 => node_binding::<0>(depends_on, kind),
        1 => node_binding::<1>(depends_on, kind),
        2 => node_binding::<2>(depends_on, kind),
        _ => node_binding::<3>(depends_on, kind),
    }
}

fn expected(graph: &[Option<Option<u8>>], start: u8) -> Expected {
    let mut visited = Vec::new();
    let mut current = start;
    loop {
        if visited.contains(&current) {
            return Expected::Loop;
        }
        visited.push(current);
        match graph[current as usize] {
            None => return Expected::Unbound,
            Some(None) => return Expected::Resolves,
            Some(Some(next)) => current = next,
        }
    }
}

fuzz_target!(|scenario: Scenario| {
    let silent = scenario.silent_override;
    let mut builder = Container::builder().silent_override(silent);
    let mut graph: Vec<Option<Option<u8>>> = vec![None; NODES as usize];

    for declare in scenario.declarations.into_iter().take(32) {
        let node = declare.node % NODES;
        let depends_on = declare.depends_on.map(|d| d % NODES);
        let bound = graph[node as usize].is_some();

        let mut declaration = Declaration::new(binding(node, depends_on, declare.kind));
        if declare.overriding {
            declaration = declaration.overriding();
        }

        if declare.overriding && !bound {
            // Rejected; replay on a scratch builder to check the error
            let err = Container::builder()
                .silent_override(silent)
                .declare(declaration)
                .unwrap_err();
            assert!(matches!(
                err,
                DiError::OverwritingBinding {
                    reason: OverrideViolation::NothingToOverride,
                    ..
                }
            ));
            continue;
        }

        if !declare.overriding && bound && !silent {
            let err = Container::builder()
                .declare(binding(node, None, Kind::Provider))
                .and_then(|b| b.declare(declaration))
                .unwrap_err();
            assert!(matches!(err, DiError::DuplicateBinding { .. }));
            continue;
        }

        builder = builder.declare(declaration).expect("declaration accepted");
        graph[node as usize] = Some(depends_on);
    }

    let container = builder.build();
    assert_eq!(
        container.len(),
        graph.iter().filter(|node| node.is_some()).count()
    );

    for start in scenario.resolutions.into_iter().take(16) {
        let start = start % NODES;
        let result = resolve_node(&container, start);

        match (expected(&graph, start), result) {
            (Expected::Resolves, Ok(())) => {}
            (Expected::Unbound, Err(DiError::NotFound { .. })) => {}
            (Expected::Loop, Err(DiError::DependencyLoop { path })) => {
                assert!(path.len() >= 2);
                assert_eq!(path.first(), path.last());
            }
            (expected, result) => {
                panic!("expected {expected:?} resolving node {start}, got {result:?}")
            }
        }
    }
});
