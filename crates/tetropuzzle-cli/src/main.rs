mod command;
mod puzzles;
mod util;

fn main() -> anyhow::Result<()> {
    command::run()
}
