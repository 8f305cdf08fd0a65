use ndarray::{s, Array3, ArrayView3};




/**
 * Sample a coarse array onto a mesh with twice the linear resolution, using
 * piecewise-constant (nearest-neighbor) injection: every fine zone
 * `(2a + x, 2b + y)` receives the value of the coarse zone `(a, b)`. The
 * result of a `(m, n, k)` input has shape `(2m, 2n, k)`.
 *
 * Low order is intentional. This operator only synthesizes guard zone data
 * from a coarser neighbor, it is not part of any update scheme.
 */
pub fn prolongation(a: ArrayView3<f64>) -> Array3<f64> {
    let (mi, mj, k) = a.dim();
    let mut result = Array3::zeros((mi * 2, mj * 2, k));

    for di in 0..2 {
        for dj in 0..2 {
            result.slice_mut(s![di..;2, dj..;2, ..]).assign(&a);
        }
    }
    result
}




/**
 * Sample a fine array onto a mesh with half the linear resolution. Each
 * coarse zone is the unweighted average of the four fine zones covering it.
 * The result of a `(2m, 2n, k)` input has shape `(m, n, k)`; the input
 * extents must be even.
 */
pub fn restriction(a: ArrayView3<f64>) -> Array3<f64> {
    let (mi, mj, _) = a.dim();

    assert!(
        mi % 2 == 0 && mj % 2 == 0,
        "restriction requires even extents, got ({}, {})", mi, mj);

    let b00 = a.slice(s![0..;2, 0..;2, ..]);
    let b01 = a.slice(s![0..;2, 1..;2, ..]);
    let b10 = a.slice(s![1..;2, 0..;2, ..]);
    let b11 = a.slice(s![1..;2, 1..;2, ..]);

    (&b00 + &b01 + &b10 + &b11) * 0.25
}




/**
 * Return one of the four half-extent corners of the given array, selected by
 * `(i, j)` with each selector either 0 or 1. Non-binary selectors are a
 * programmer error, as are odd extents.
 */
pub fn quadrant(a: ArrayView3<f64>, i: usize, j: usize) -> Array3<f64> {
    let (mi, mj, _) = a.dim();

    assert!(
        i < 2 && j < 2,
        "quadrant selectors must be 0 or 1, got ({}, {})", i, j);
    assert!(
        mi % 2 == 0 && mj % 2 == 0,
        "quadrant requires even extents, got ({}, {})", mi, mj);

    a.slice(s![i * mi / 2..(i + 1) * mi / 2, j * mj / 2..(j + 1) * mj / 2, ..]).to_owned()
}




/**
 * Mosaic four equally shaped arrays into one with twice the extent on each
 * block axis. Input `n` lands at block `(n / 2, n % 2)`, which matches the
 * child ordering produced by `PatchIndex::refine`.
 */
pub fn tile(children: [ArrayView3<f64>; 4]) -> Array3<f64> {
    let (mi, mj, k) = children[0].dim();
    let mut result = Array3::zeros((mi * 2, mj * 2, k));

    for (n, child) in children.iter().enumerate() {
        assert!(
            child.dim() == (mi, mj, k),
            "tile requires equally shaped children");

        let (a, b) = (n / 2, n % 2);
        result
            .slice_mut(s![a * mi..(a + 1) * mi, b * mj..(b + 1) * mj, ..])
            .assign(child);
    }
    result
}
