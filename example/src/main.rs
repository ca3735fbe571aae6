use mdvec::{slices, Array3, Element};
use ndarray::{s, Array};

fn main() {
    let dim = [4, 5, 6];
    let n: usize = dim.iter().product();

    let a = Array3::from_vec((0..n).map(|i| i as f64).collect(), dim).unwrap();
    let b = Array3::from_elem(dim, 2.0f64).unwrap();
    let c = Array3::from_expr((&a + &b) * &a - &a / &b).unwrap();

    let na = Array::from_shape_vec(dim, a.data().to_vec()).unwrap();
    let nb = Array::from_elem(dim, 2.0f64);
    let nc = (&na + &nb) * &na - &na / &nb;
    assert_eq!(c.data(), nc.as_slice().unwrap());
    println!(
        "{} elements of {:?}, lane width {}: matches ndarray",
        c.size(),
        f64::DTYPE,
        f64::pack_size()
    );

    let w = c.slice(slices![1..=2, .., ..]).unwrap();
    let nw = nc.slice(s![1..=2, .., ..]);
    assert_eq!(w.shape(), nw.shape());
    assert!(w.iter().zip(nw.iter()).all(|(x, y)| x == y));
    println!("slice {:?} starts at {}", w.shape(), w[[0, 0, 0]]);

    let mut d = c.clone();
    {
        let mut row = d.slice_mut(slices![3, 4, ..]).unwrap();
        row += 1.0;
        row *= b.slice(slices![0, 0, ..]).unwrap();
        println!("last row: {:?}", row);
    }
    match d.slice(slices![0, .., 2..=4]) {
        Ok(_) => unreachable!(),
        Err(e) => println!("rejected: {}", e),
    }
}
