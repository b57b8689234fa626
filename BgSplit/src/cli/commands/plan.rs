//! CLI command for previewing a tile grid

use crate::planner::{needs_split, plan_grid};

pub fn execute(width: u32, height: u32, limit: u32, padding: f64, cells: bool) -> anyhow::Result<()> {
    if !needs_split(width, height, limit) {
        println!("{width}x{height} fits within {limit}px; no split needed");
        return Ok(());
    }

    let plan = plan_grid(width, height, limit, padding)?;
    println!("Image: {width}x{height}");
    println!("Limit: {limit}px (tile ceiling {}px)", plan.ceiling);
    println!("Grid: {}x{} = {} tiles", plan.cols, plan.rows, plan.len());
    println!("Base tile: {}x{}", plan.tile_width, plan.tile_height);

    if cells {
        println!();
        println!("{:>4} {:>4} {:>8} {:>8} {:>7} {:>7}", "col", "row", "x", "y", "width", "height");
        for cell in &plan.cells {
            println!(
                "{:>4} {:>4} {:>8} {:>8} {:>7} {:>7}",
                cell.col, cell.row, cell.offset_x, cell.offset_y, cell.width, cell.height
            );
        }
    }

    Ok(())
}
