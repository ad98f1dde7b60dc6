use super::nom_prelude::*;

pub fn usize_<'a, E>(input: &'a str) -> IResult<&'a str, usize, E>
  where
    E: ParseError<&'a str> + error::FromExternalError<&'a str, ParseIntError>
{
  map_res(digit1, usize::from_str)(input)
}

pub fn usize_line<'a, E>(input: &'a str) -> IResult<&'a str, usize, E>
  where
    E: ParseError<&'a str> + error::FromExternalError<&'a str, ParseIntError>
{
  terminated(usize_, newline)(input)
}

/// A line of whitespace-separated reals, `count` of them, terminated by a newline.
pub fn doubles_line<'a, E>(count: usize) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<f64>, E>
  where
    E: ParseError<&'a str>
{
  debug_assert!(count > 0);
  move |input| {
    let (input, first) = double(input)?;
    let (input, mut rest) = many_m_n(count - 1, count - 1, preceded(space1, double))(input)?;
    let (input, _) = terminated(space0, newline)(input)?;
    rest.insert(0, first);
    Ok((input, rest))
  }
}
