#[cfg(test)]
mod test_forcing;

#[cfg(test)]
mod test_grid_io;

#[cfg(test)]
mod test_stack;

#[cfg(test)]
mod test_clock;

#[cfg(test)]
mod test_overland_drain;

#[cfg(test)]
mod test_channel_flow;

#[cfg(test)]
mod test_floodplain;

#[cfg(test)]
mod test_solids_balance;

#[cfg(test)]
mod test_chemicals;

#[cfg(test)]
mod test_deck;
