use rustc_hash::FxHashSet;

fn pre_sort(v: usize, g: &[Vec<usize>], sorted: &mut Vec<usize>, done: &mut FxHashSet<usize>) {
    if done.insert(v) {
        for w in &g[v] {
            pre_sort(*w, g, sorted, done);
        }
        sorted.push(v);
    }
}

fn collect_scc(v: usize, rg: &[Vec<usize>], c: &mut Vec<usize>, to_be_done: &mut FxHashSet<usize>) {
    c.push(v);
    for w in &rg[v] {
        if to_be_done.remove(w) {
            collect_scc(*w, rg, c, to_be_done);
        }
    }
}

/// Strongly connected components of `g`, given as adjacency lists over
/// `0..g.len()`, in topological order: a component precedes every
/// component it has an edge to. Components with no path between them keep
/// the order of their smallest index. Each component is sorted.
pub fn scc(g: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut rg = vec![Vec::new(); g.len()];
    for (v, ws) in g.iter().enumerate() {
        for w in ws {
            rg[*w].push(v);
        }
    }
    let mut sorted = Vec::with_capacity(g.len());
    let mut done = FxHashSet::default();
    for v in (0..g.len()).rev() {
        pre_sort(v, g, &mut sorted, &mut done);
    }
    let mut to_be_done = done;
    let mut cs = Vec::new();
    for v in sorted.into_iter().rev() {
        if to_be_done.remove(&v) {
            let mut c = Vec::new();
            collect_scc(v, &rg, &mut c, &mut to_be_done);
            c.sort_unstable();
            cs.push(c);
        }
    }
    cs
}
